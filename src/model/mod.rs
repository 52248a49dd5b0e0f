pub mod actions;
pub mod adapters;
pub mod placements;
pub mod registry;
pub mod results;
