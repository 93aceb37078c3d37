// Core modules implementing table storage, path resolution, and error modeling.
pub mod error;
pub mod paths;
pub mod table;
