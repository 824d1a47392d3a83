mod contract_repo;
mod job_repo;
mod user_repo;

pub use contract_repo::ContractRepo;
pub use job_repo::JobRepo;
pub use user_repo::UserRepo;
