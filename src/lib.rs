pub mod allocator;
pub mod amount;
pub mod batch;
pub mod csv;
pub mod engine;
pub mod model;
pub mod number;
pub mod service;
pub mod store;

pub use allocator::{AllocateError, Allocator, AllocatorConfig};
pub use amount::Amount;
pub use batch::BatchRunner;
pub use engine::{Evaluation, RedemptionOutcome, RedemptionReason, evaluate};
pub use model::{
    Campaign, CampaignDetails, CampaignId, GiftCardSnapshot, GiftCardStatus, GiftCardUpdate,
    InvalidCampaign, NewGiftCard, Operation,
};
pub use number::{NumberFormat, check_digit, generate_candidate, verify};
pub use service::{GiftCardService, ServiceError};
pub use store::{CampaignStore, GiftCardStore, MemoryStore, StoreError};
