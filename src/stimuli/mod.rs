pub mod catalog;
pub mod condition;
pub mod sampler;
pub mod selectors;
pub mod trial_list;
