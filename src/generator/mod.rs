pub mod brief;
pub mod clarify;
pub mod compose;
pub mod context;
pub mod cost;
pub mod events;
pub mod outlet;
pub mod prompts;
pub mod research;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;
