use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pdf_qa_rag_webapp::{
    api,
    app_state::AppState,
    config,
    llm::LlmManager,
    loader::PdfPageLoader,
    pipeline::DocumentPipeline,
    session::SessionController,
    splitter::TextSplitter,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env().context("Error al cargar la configuración")?;
    if cfg.llm_api_key.is_none() {
        warn!(
            "{} no está definida: todas las llamadas de embeddings y LLM fallarán.",
            cfg.llm_provider.api_key_var()
        );
    }

    // 3. Proveedores y pipeline
    let llm_manager = Arc::new(LlmManager::from_config(&cfg));
    let splitter = TextSplitter::new(cfg.chunk_size, cfg.chunk_overlap)?;
    let pipeline = DocumentPipeline::new(Arc::new(PdfPageLoader), splitter, llm_manager.clone());
    let controller = SessionController::new(&cfg, pipeline, llm_manager.clone(), llm_manager);

    // Crear canal para la señal de apagado.
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    // 4. Estado compartido de la aplicación
    let app_state = AppState::new(controller).with_shutdown(shutdown_tx);

    // 5. Router de la API
    let app = Router::new().merge(api::create_router(app_state)).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    // 6. Iniciar el servidor
    let listener = tokio::net::TcpListener::bind(&cfg.server_addr)
        .await
        .with_context(|| format!("No se pudo escuchar en {}", cfg.server_addr))?;
    info!(
        "🚀 Servidor escuchando en http://{} (datos: {}, caché: {})",
        cfg.server_addr,
        cfg.data_dir.display(),
        cfg.cache_dir.display()
    );

    // Configurar el apagado ordenado.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}
