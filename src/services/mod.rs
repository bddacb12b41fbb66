pub mod presenter;
pub mod recipe_service;
pub mod relations;
pub mod shopping_list;
pub mod storage;
