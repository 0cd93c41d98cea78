pub mod slot;
pub mod test_utils;
