pub mod config;
pub mod count;
pub mod detect;
pub mod diff;
pub mod fonts;
pub mod iris;
pub mod models;
pub mod morph;
pub mod output;
pub mod pipeline;
pub mod prep;
pub mod river;
pub mod segment;
pub mod terrain;

pub use models::Blob;
pub use pipeline::{MetaValue, Pipeline, Region, Stage, StageContext, StageImage};
pub use terrain::{ClassifierConfig, TerrainClass, TerrainClassifier};
