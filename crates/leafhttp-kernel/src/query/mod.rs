//! URL query items and query-item groups (§4.2).

mod group;
mod item;
mod raw;

pub use group::{raw_flat_map, raw_map, GroupMatch, QueryItemGroup};
pub use item::{
    bool_item, optional, optional_parsed, optional_with, required, required_parsed,
    required_with, void, Classification, LosslessFromString, QueryItem,
};
pub use raw::RawQuery;
