//! SeaORM entity models
//!
//! Database entities for the manuscript workflow

mod assignment;
mod manuscript;
mod review;
mod revision;

pub use manuscript::{
    Entity as ManuscriptEntity,
    Model as ManuscriptRow,
    ActiveModel as ManuscriptActiveModel,
    Column as ManuscriptColumn,
};

pub use revision::{
    Entity as RevisionEntity,
    Model as RevisionRow,
    ActiveModel as RevisionActiveModel,
    Column as RevisionColumn,
};

pub use assignment::{
    Entity as AssignmentEntity,
    Model as AssignmentRow,
    ActiveModel as AssignmentActiveModel,
    Column as AssignmentColumn,
};

pub use review::{
    Entity as ReviewEntity,
    Model as ReviewRow,
    ActiveModel as ReviewActiveModel,
    Column as ReviewColumn,
};
