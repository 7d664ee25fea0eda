mod beautify;
mod blocks;
mod classify;
mod match_format;
mod options;
mod reconstruct;
mod run;
mod sanitize;
mod syllabus;
#[cfg(test)]
mod tests;
mod types;

pub use run::run;
