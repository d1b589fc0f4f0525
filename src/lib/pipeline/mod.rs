pub mod group;

pub mod prelude {
    pub use super::group::{
        DiscardCondition, DiscardToggles, FeatureIndex, FeatureIndexBuilder, GroupOptions, Grouper,
        Partition, ReadGroupRegistry, SeqInterval,
    };
}
