pub mod assets;
pub mod batch;
pub mod cms;
pub mod config;
pub mod db;
pub mod dest;
pub mod fragment;
pub mod log;
pub mod mappers;
pub mod merge;
pub mod news;
pub mod origin;
pub mod pipeline;
pub mod regions;
pub mod scan;
pub mod sections;
pub mod xml;
