use ladle_catalog::CatalogRepository;
use ladle_dispatch::assembler::RouteAssembler;
use ladle_dispatch::progress::DeliveryProgressService;
use ladle_dispatch::synchronizer::DeliverySynchronizer;
use ladle_order::ledger::OrderLedger;
use ladle_order::repository::OrderRepository;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogRepository>,
    pub ledger: Arc<OrderLedger>,
    pub orders: Arc<dyn OrderRepository>,
    pub synchronizer: Arc<DeliverySynchronizer>,
    pub assembler: Arc<RouteAssembler>,
    pub progress: Arc<DeliveryProgressService>,
}
