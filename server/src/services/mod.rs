//! Service layer: the deal orchestrator, channel/wallet/campaign services,
//! the chain indexer, the three lifecycle workers and the external
//! collaborator clients.

pub mod bot_client;
pub mod campaign;
pub mod channel;
pub mod deal;
pub mod hold_release;
pub mod indexer;
pub mod post_monitor;
pub mod timeout_sweeper;
pub mod tme_client;
pub mod wallet;

pub use bot_client::{AdminCheck, AdminInfo, BotApi, BotClient};
pub use campaign::{CampaignInput, CampaignService};
pub use channel::{ChannelService, ExploreChannel, ExploreFilter};
pub use deal::{Actor, CreativeInput, DealService};
pub use hold_release::HoldReleaseWorker;
pub use indexer::TonIndexer;
pub use post_monitor::PostMonitor;
pub use timeout_sweeper::TimeoutSweeper;
pub use tme_client::{PostCheck, PostFetcher, TmePageClient};
pub use wallet::{ConnectWalletRequest, WalletService};
