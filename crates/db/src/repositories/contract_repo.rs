//! Repository for the `contracts` table.

use clausewatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::contract::{Contract, CreateContract};

/// Column list for `contracts` queries.
const COLUMNS: &str = "\
    id, owner_user_id, file_name, file_size, content_type, content_sha256, \
    storage_path, created_at, updated_at";

pub struct ContractRepo;

impl ContractRepo {
    pub async fn create(pool: &PgPool, input: &CreateContract) -> Result<Contract, sqlx::Error> {
        let query = format!(
            "INSERT INTO contracts \
                 (owner_user_id, file_name, file_size, content_type, content_sha256, storage_path) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Contract>(&query)
            .bind(input.owner_user_id)
            .bind(&input.file_name)
            .bind(input.file_size)
            .bind(&input.content_type)
            .bind(&input.content_sha256)
            .bind(&input.storage_path)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Contract>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM contracts WHERE id = $1");
        sqlx::query_as::<_, Contract>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a contract by id only if `owner_user_id` owns it.
    pub async fn find_owned(
        pool: &PgPool,
        id: DbId,
        owner_user_id: DbId,
    ) -> Result<Option<Contract>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM contracts WHERE id = $1 AND owner_user_id = $2");
        sqlx::query_as::<_, Contract>(&query)
            .bind(id)
            .bind(owner_user_id)
            .fetch_optional(pool)
            .await
    }

    /// Find the owner's contract with identical content, if one exists.
    pub async fn find_by_owner_and_hash(
        pool: &PgPool,
        owner_user_id: DbId,
        content_sha256: &str,
    ) -> Result<Option<Contract>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM contracts WHERE owner_user_id = $1 AND content_sha256 = $2"
        );
        sqlx::query_as::<_, Contract>(&query)
            .bind(owner_user_id)
            .bind(content_sha256)
            .fetch_optional(pool)
            .await
    }
}
