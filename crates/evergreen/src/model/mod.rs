// public exports are one module level down
pub mod attribute;
pub mod relation;
