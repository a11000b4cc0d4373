pub mod assembler;
pub mod memory;
pub mod models;
pub mod progress;
pub mod repository;
pub mod synchronizer;

pub use assembler::{AssemblerConfig, DispatchError, DriverPicker, FifoDriverPicker, RouteAssembler, RouteOptimizer, RoutePlan};
pub use memory::InMemoryDispatchStore;
pub use models::{Delivery, DeliveryStatus, Driver, Route, RouteStatus};
pub use progress::DeliveryProgressService;
pub use repository::{DeliveryRepository, DriverRepository, RouteRepository, SyncCandidate};
pub use synchronizer::DeliverySynchronizer;
