//! Persistent records. Query methods live on the structs and take a bare
//! `&mut SqliteConnection`; services wrap them with `db::with_conn`.

pub mod audit;
pub mod campaign;
pub mod channel;
pub mod creative;
pub mod deal;
pub mod escrow;
pub mod listing;
pub mod post;
pub mod user;
pub mod wallet;
pub mod withdraw;

pub use audit::{AuditEntry, NewAuditEntry};
pub use campaign::{Campaign, NewCampaign};
pub use channel::{Channel, ChannelFilter, ChannelMember, NewChannel, NewChannelMember, StatsSnapshot};
pub use creative::{DealCreative, NewCreative};
pub use deal::{Deal, DealFilter, DealWithChannel, NewDeal};
pub use escrow::{EscrowLedger, NewEscrow};
pub use listing::{ChannelListing, ListingUpdate};
pub use post::{DealPost, PostPatch};
pub use user::User;
pub use wallet::{NewUserWallet, ProofPayload, UserWallet};
pub use withdraw::WithdrawWallet;
