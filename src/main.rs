use std::sync::Mutex;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::bail;
use log::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use hashlink_ledger::api;
use hashlink_ledger::blockchain::{self, Ledger};
use hashlink_ledger::config::{self, LedgerConfig};
use hashlink_ledger::demo;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::get_chain,
        api::handlers::append_block,
        api::handlers::mine_block,
        api::handlers::validate_chain
    ),
    components(
        schemas(
            blockchain::BlockSummary,
            blockchain::Violation,
            api::handlers::ChainResponse,
            api::handlers::AppendRequest,
            api::handlers::MineRequest,
            api::handlers::MineResponse,
            api::handlers::ValidationResponse
        )
    ),
    tags(
        (name = "ledger", description = "Ledger API endpoints")
    ),
    info(
        title = "Hashlink Ledger API",
        version = "0.1.0",
        description = "A hash-linked, tamper-evident ledger with proof of work",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

async fn serve(config: LedgerConfig) -> anyhow::Result<()> {
    let miner = web::Data::new(config.server_miner()?);
    let ledger = web::Data::new(Mutex::new(Ledger::new()));

    let LedgerConfig { server, .. } = config;
    info!("Starting HTTP server at http://{}:{}", server.host, server.port);

    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Configure OpenAPI documentation
        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(ledger.clone())
            .app_data(miner.clone())
            // API routes
            .configure(api::configure_routes)
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
    })
    .bind((server.host, server.port))?
    .run()
    .await?;

    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = config::load_config()?;
    let command = std::env::args().nth(1).unwrap_or_else(|| "serve".to_string());

    match command.as_str() {
        "serve" => serve(config).await?,
        "demo" => {
            demo::run_tamper_demo()?;
        }
        "mine" => {
            demo::run_mining_demo(&config.miner()?)?;
        }
        "select" => demo::run_selection_demo()?,
        other => bail!("Unknown command: {} (expected serve, demo, mine or select)", other),
    }

    Ok(())
}
