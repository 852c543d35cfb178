pub mod ai;
pub mod entity;
pub mod grid;
pub mod pathing;
pub mod tile;
pub mod visibility;
