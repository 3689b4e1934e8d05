pub mod braces;
pub mod case_map;
pub mod config;
pub mod page;
pub mod parameters;
pub mod sections;
pub mod tags;
pub mod template;
pub mod template_scan;
pub mod title;
pub mod wikitext;
