use crate::record::RelationCatalog;
use std::fmt;

///
/// RelationShape
///
/// Closed vocabulary of relationship shapes a catalog may describe.
/// The engine supports four of them; `ManyToMany` (a direct association
/// with no intermediate record) is named here so that declaring a
/// dependency across one fails at configuration time with a descriptive
/// error instead of a silent no-op.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RelationShape {
    /// Owner holds many related records; each related record carries the
    /// owner's foreign key.
    ManyToOne,
    /// Owner holds exactly one related record; same resolution as
    /// `ManyToOne` with a collection of size one.
    OneToOne,
    /// Inverse shape: the related record is the "one" side and the owner
    /// records are its children, located by the foreign key they carry.
    OneToMany,
    /// Owner and related are connected via an intermediate record.
    ManyToManyThrough,
    /// Direct many-to-many without an intermediate record. Not supported.
    ManyToMany,
}

impl fmt::Display for RelationShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ManyToOne => "many_to_one",
            Self::OneToOne => "one_to_one",
            Self::OneToMany => "one_to_many",
            Self::ManyToManyThrough => "many_to_many_through",
            Self::ManyToMany => "many_to_many",
        };
        write!(f, "{label}")
    }
}

///
/// ThroughModel
///
/// Resolution keys for a through-intermediate relation, walked from the
/// related record toward the owner.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ThroughModel {
    /// Type path of the intermediate record.
    pub intermediate_path: &'static str,
    /// Foreign key on the *related* record referencing the intermediate.
    pub intermediate_foreign_key: &'static str,
    /// Foreign key on the *intermediate* record referencing the owner.
    pub owner_foreign_key: &'static str,
}

///
/// RelationModel
///
/// Runtime relationship metadata as returned by a `RelationCatalog`.
/// For through relations the resolving keys live in `through`; the
/// direct `foreign_key` is authoritative for every other shape.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RelationModel {
    /// Relation name as used in dependency declarations.
    pub name: &'static str,
    pub shape: RelationShape,
    /// Type path of the related record.
    pub related_path: &'static str,
    pub foreign_key: &'static str,
    pub through: Option<ThroughModel>,
}

impl RelationModel {
    #[must_use]
    pub const fn many_to_one(
        name: &'static str,
        related_path: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            name,
            shape: RelationShape::ManyToOne,
            related_path,
            foreign_key,
            through: None,
        }
    }

    #[must_use]
    pub const fn one_to_one(
        name: &'static str,
        related_path: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            name,
            shape: RelationShape::OneToOne,
            related_path,
            foreign_key,
            through: None,
        }
    }

    #[must_use]
    pub const fn one_to_many(
        name: &'static str,
        related_path: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            name,
            shape: RelationShape::OneToMany,
            related_path,
            foreign_key,
            through: None,
        }
    }

    #[must_use]
    pub const fn many_to_many_through(
        name: &'static str,
        related_path: &'static str,
        through: ThroughModel,
    ) -> Self {
        Self {
            name,
            shape: RelationShape::ManyToManyThrough,
            related_path,
            foreign_key: through.intermediate_foreign_key,
            through: Some(through),
        }
    }

    #[must_use]
    pub const fn many_to_many(name: &'static str, related_path: &'static str) -> Self {
        Self {
            name,
            shape: RelationShape::ManyToMany,
            related_path,
            foreign_key: "",
            through: None,
        }
    }
}

///
/// StaticCatalog
///
/// Simple owned `RelationCatalog`: relations registered per owner type at
/// bootstrap. Lookup is a linear scan; catalogs are configuration-sized.
///

#[derive(Debug, Default)]
pub struct StaticCatalog {
    relations: Vec<(&'static str, RelationModel)>,
}

impl StaticCatalog {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            relations: Vec::new(),
        }
    }

    /// Register a relation owned by `owner_path`. Re-registering the same
    /// `(owner, name)` pair replaces the earlier entry.
    pub fn insert(&mut self, owner_path: &'static str, model: RelationModel) {
        self.relations
            .retain(|(owner, existing)| !(*owner == owner_path && existing.name == model.name));
        self.relations.push((owner_path, model));
    }
}

impl RelationCatalog for StaticCatalog {
    fn relation(&self, owner_path: &str, name: &str) -> Option<&RelationModel> {
        self.relations
            .iter()
            .find(|(owner, model)| *owner == owner_path && model.name == name)
            .map(|(_, model)| model)
    }
}
