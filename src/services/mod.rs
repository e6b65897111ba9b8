pub mod application_service;
pub mod storage_service;
