// Line editor integration
pub mod autocomplete;

pub use autocomplete::ShellHelper;
