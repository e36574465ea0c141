#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Usage tracking, user feedback and FAQ-candidate discovery.

pub mod anonymize;
pub mod group;
pub mod ledger;
pub mod log;

pub use anonymize::anonymize;
pub use group::{group_similar, CandidateGroup, GroupMember};
pub use ledger::{UnusedDocument, UsageLedger};
pub use log::{
    CandidateQuestion, FeedbackStats, InteractionId, InteractionLog, InteractionOutcome, InteractionRecord,
    InteractionState, InteractionStats,
};
