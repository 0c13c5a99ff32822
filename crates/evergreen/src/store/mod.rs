// public exports are one module level down
pub mod memory;
