pub mod dates;
pub mod db_utils;
pub mod username_cache;
pub mod validation;
