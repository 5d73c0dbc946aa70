//! API server: HTTP surface, authentication, real-time fan-out.
//!
//! The worker and indexer are separate binaries (`worker`, `ton-indexer`);
//! all three share the library crate and the same database.

use std::sync::Arc;

use actix::Actor;
use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use tracing::{info, warn};

use admarket::config::Config;
use admarket::db;
use admarket::events::{Publisher, RedisPublisher, RedisSubscriber, Subscriber, TOPIC_DEAL};
use admarket::handlers;
use admarket::kv::init_redis_pool;
use admarket::middleware::{RequestTrace, RequireAuth};
use admarket::services::{
    BotClient, CampaignService, ChannelService, DealService, WalletService,
};
use admarket::telemetry::init_tracing;
use admarket::websocket::{BusEvent, WsHub};

#[actix_web::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = Config::from_env();
    config.warn_on_defaults();

    let pool = db::create_pool(&config.database_url, 10)?;
    db::run_migrations(&pool).context("migrations failed")?;

    let redis_pool = init_redis_pool(&config.redis_url)?;
    let publisher: Arc<dyn Publisher> = Arc::new(RedisPublisher::new(redis_pool.clone()));

    // Real-time fan-out: every events:deal message goes to the hub, the hub
    // pushes it to every connected socket.
    let hub = WsHub::new().start();
    let subscriber = RedisSubscriber::new(&config.redis_url)?;
    {
        let hub = hub.clone();
        if let Err(e) = subscriber
            .subscribe(
                TOPIC_DEAL,
                Arc::new(move |event| hub.do_send(BusEvent(event))),
            )
            .await
        {
            warn!(error = %e, "deal event subscription failed, websocket pushes disabled");
        }
    }

    let bot = Arc::new(BotClient::new(&config.bot_internal_url)?);

    let deal_service = web::Data::new(DealService::new(
        pool.clone(),
        publisher.clone(),
        config.ton_hot_wallet_address.clone(),
        config.platform_fee_bps,
        config.hold_period_seconds,
    ));
    let channel_service = web::Data::new(ChannelService::new(pool.clone(), bot));
    let wallet_service = web::Data::new(WalletService::new(
        pool.clone(),
        config.ton_network.clone(),
        config.ton_proof_allowed_domains.clone(),
    ));
    let campaign_service = web::Data::new(CampaignService::new(pool.clone()));

    let api_addr = config.api_addr.clone();
    let config_data = web::Data::new(config);
    let pool_data = web::Data::new(pool);
    let hub_data = web::Data::new(hub);

    info!(addr = %api_addr, "API server starting");

    HttpServer::new(move || {
        App::new()
            .app_data(config_data.clone())
            .app_data(pool_data.clone())
            .app_data(hub_data.clone())
            .app_data(deal_service.clone())
            .app_data(channel_service.clone())
            .app_data(wallet_service.clone())
            .app_data(campaign_service.clone())
            // RequestTrace also emits the access log line, correlated by id.
            .wrap(RequestTrace)
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allowed_headers(vec![
                        "Origin",
                        "Content-Type",
                        "Accept",
                        "Authorization",
                        "X-Request-ID",
                    ]),
            )
            .route("/health", web::get().to(handlers::health))
            .route("/ws", web::get().to(handlers::ws::ws_connect))
            .service(
                web::scope("/api/v1")
                    .route("/auth/telegram", web::post().to(handlers::auth::telegram_auth))
                    .service(
                        web::scope("")
                            .wrap(RequireAuth)
                            .route("/me", web::get().to(handlers::user::get_me))
                            .route("/me/ping", web::post().to(handlers::user::ping))
                            .route(
                                "/me/wallet/proof-payload",
                                web::post().to(handlers::wallet::proof_payload),
                            )
                            .route(
                                "/me/wallet/connect",
                                web::post().to(handlers::wallet::connect_wallet),
                            )
                            .route(
                                "/me/wallet",
                                web::delete().to(handlers::wallet::disconnect_wallet),
                            )
                            .route("/me/wallet", web::get().to(handlers::wallet::get_wallet))
                            .route("/channels", web::post().to(handlers::channel::create_channel))
                            .route("/channels/my", web::get().to(handlers::channel::my_channels))
                            .route("/channels", web::get().to(handlers::channel::search_channels))
                            .route(
                                "/channels/{id}/stats",
                                web::get().to(handlers::channel::channel_stats),
                            )
                            .route(
                                "/channels/{id}/invite-bot",
                                web::post().to(handlers::channel::invite_bot),
                            )
                            .route(
                                "/channels/{id}/managers",
                                web::post().to(handlers::channel::add_manager),
                            )
                            .route(
                                "/channels/{id}/admins",
                                web::get().to(handlers::channel::channel_admins),
                            )
                            .route("/channels/{id}", web::get().to(handlers::channel::get_channel))
                            .route(
                                "/explore/channels",
                                web::get().to(handlers::channel::explore_channels),
                            )
                            .route(
                                "/listings/{channel_id}",
                                web::put().to(handlers::channel::update_listing),
                            )
                            .route(
                                "/listings/{channel_id}",
                                web::get().to(handlers::channel::get_listing),
                            )
                            .route(
                                "/campaigns",
                                web::post().to(handlers::campaign::create_campaign),
                            )
                            .route("/campaigns", web::get().to(handlers::campaign::list_campaigns))
                            .route(
                                "/campaigns/{id}",
                                web::get().to(handlers::campaign::get_campaign),
                            )
                            .route(
                                "/campaigns/{id}",
                                web::put().to(handlers::campaign::update_campaign),
                            )
                            .route(
                                "/campaigns/{id}",
                                web::delete().to(handlers::campaign::delete_campaign),
                            )
                            .route("/deals", web::post().to(handlers::deal::create_deal))
                            .route("/deals", web::get().to(handlers::deal::list_deals))
                            .route(
                                "/deals/{id}/submit",
                                web::post().to(handlers::deal::submit_deal),
                            )
                            .route(
                                "/deals/{id}/accept",
                                web::post().to(handlers::deal::accept_deal),
                            )
                            .route(
                                "/deals/{id}/reject",
                                web::post().to(handlers::deal::reject_deal),
                            )
                            .route(
                                "/deals/{id}/cancel",
                                web::post().to(handlers::deal::cancel_deal),
                            )
                            .route(
                                "/deals/{id}/creative/approve",
                                web::post().to(handlers::deal::approve_creative),
                            )
                            .route(
                                "/deals/{id}/creative/request-changes",
                                web::post().to(handlers::deal::request_creative_changes),
                            )
                            .route(
                                "/deals/{id}/creative",
                                web::post().to(handlers::deal::submit_creative),
                            )
                            .route(
                                "/deals/{id}/creative",
                                web::get().to(handlers::deal::get_creative),
                            )
                            .route(
                                "/deals/{id}/post/mark-manual",
                                web::post().to(handlers::deal::mark_manual_post),
                            )
                            .route(
                                "/deals/{id}/finance/set-withdraw-wallet",
                                web::post().to(handlers::deal::set_withdraw_wallet),
                            )
                            .route(
                                "/deals/{id}/events",
                                web::get().to(handlers::deal::deal_events),
                            )
                            .route(
                                "/deals/{id}/payment",
                                web::get().to(handlers::deal::payment_info),
                            )
                            .route("/deals/{id}", web::get().to(handlers::deal::get_deal)),
                    ),
            )
    })
    .bind(&api_addr)
    .with_context(|| format!("failed to bind {api_addr}"))?
    .run()
    .await
    .context("server terminated")
}
