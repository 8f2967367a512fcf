//! `SQLite` store.
//!
//! Shells and submodels are stored whole as CBOR blobs, one row per
//! identifiable. Element edits load the owning submodel, change it and
//! write it back inside one transaction.

use crate::modifier::OutputModifier;
use crate::persistence::{new_handle, Persistence, PersistenceError};
use crate::tree::{check_identifiable, not_found, put_element, target, Target};
use aas_assetsync_core::{
    AssetAdministrationShell, Environment, OperationHandle, OperationResult, Referable, Reference,
    Submodel, SubmodelElement,
};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

const SHELL: &str = "shell";
const SUBMODEL: &str = "submodel";

/// `SQLite`-backed store.
pub struct SqlitePersistence {
    conn: Mutex<Connection>,
}

impl SqlitePersistence {
    /// Open or create a database file.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or initialized.
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        tracing::debug!(path = %path.display(), "Opened SQLite store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be created.
    pub fn in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert or replace every shell and submodel of `environment`.
    ///
    /// # Errors
    ///
    /// Returns error if any identifiable cannot be stored; nothing is stored then.
    pub fn import(&self, environment: &Environment) -> Result<(), PersistenceError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for shell in &environment.shells {
            store(&tx, SHELL, &shell.id, shell)?;
        }
        for submodel in &environment.submodels {
            store(&tx, SUBMODEL, &submodel.id, submodel)?;
        }
        tx.commit()?;
        tracing::info!(
            shells = environment.shells.len(),
            submodels = environment.submodels.len(),
            "Imported environment"
        );
        Ok(())
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r"
        -- Shells and submodels, CBOR encoded
        CREATE TABLE IF NOT EXISTS identifiables (
            kind TEXT NOT NULL,
            id TEXT NOT NULL,
            payload BLOB NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (kind, id)
        );

        -- Asynchronous operation results by handle
        CREATE TABLE IF NOT EXISTS operation_results (
            handle_id TEXT PRIMARY KEY,
            request_id TEXT NOT NULL,
            payload BLOB NOT NULL,
            updated_at TEXT NOT NULL
        );
        ",
    )
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, PersistenceError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| PersistenceError::Encoding(e.to_string()))?;
    Ok(bytes)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, PersistenceError> {
    ciborium::from_reader(bytes).map_err(|e| PersistenceError::Encoding(e.to_string()))
}

fn load<T: DeserializeOwned>(
    conn: &Connection,
    kind: &str,
    id: &str,
) -> Result<Option<T>, PersistenceError> {
    let bytes: Option<Vec<u8>> = conn
        .query_row(
            "SELECT payload FROM identifiables WHERE kind = ?1 AND id = ?2",
            (kind, id),
            |row| row.get(0),
        )
        .optional()?;
    bytes.map(|b| decode(&b)).transpose()
}

fn store<T: Serialize>(
    conn: &Connection,
    kind: &str,
    id: &str,
    value: &T,
) -> Result<(), PersistenceError> {
    conn.execute(
        r"
        INSERT INTO identifiables (kind, id, payload, updated_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT (kind, id) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at
        ",
        (kind, id, encode(value)?, now()),
    )?;
    Ok(())
}

fn delete(conn: &Connection, kind: &str, id: &str) -> Result<(), PersistenceError> {
    conn.execute(
        "DELETE FROM identifiables WHERE kind = ?1 AND id = ?2",
        (kind, id),
    )?;
    Ok(())
}

fn load_submodel(conn: &Connection, id: &str) -> Result<Submodel, PersistenceError> {
    load(conn, SUBMODEL, id)?.ok_or_else(|| not_found(&Reference::submodel(id)))
}

impl Persistence for SqlitePersistence {
    fn get(
        &self,
        reference: &Reference,
        modifier: &OutputModifier,
    ) -> Result<Referable, PersistenceError> {
        let conn = self.conn.lock();
        let referable = match target(reference)? {
            Target::Shell(id) => load::<AssetAdministrationShell>(&conn, SHELL, id)?
                .map(Referable::Shell)
                .ok_or_else(|| not_found(reference))?,
            Target::Submodel(id) => Referable::Submodel(load_submodel(&conn, id)?),
            Target::Element { submodel_id, path } => load_submodel(&conn, submodel_id)?
                .element(path)
                .cloned()
                .map(Referable::SubmodelElement)
                .ok_or_else(|| not_found(reference))?,
        };
        Ok(modifier.apply(referable))
    }

    fn get_all_submodels(
        &self,
        modifier: &OutputModifier,
    ) -> Result<Vec<Submodel>, PersistenceError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT payload FROM identifiables WHERE kind = ?1 ORDER BY rowid")?;
        let payloads = stmt
            .query_map([SUBMODEL], |row| row.get::<_, Vec<u8>>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        payloads
            .iter()
            .map(|bytes| {
                let mut submodel: Submodel = decode(bytes)?;
                modifier.apply_children(&mut submodel.submodel_elements);
                Ok(submodel)
            })
            .collect()
    }

    fn get_submodel_elements(
        &self,
        parent: &Reference,
        modifier: &OutputModifier,
    ) -> Result<Vec<SubmodelElement>, PersistenceError> {
        let conn = self.conn.lock();
        let (submodel_id, path) = match target(parent)? {
            Target::Submodel(id) => (id, &[][..]),
            Target::Element { submodel_id, path } => (submodel_id, path),
            Target::Shell(_) => return Err(not_found(parent)),
        };
        let submodel = load_submodel(&conn, submodel_id)?;
        let mut children = submodel
            .children(path)
            .ok_or_else(|| not_found(parent))?
            .to_vec();
        modifier.apply_children(&mut children);
        Ok(children)
    }

    fn put(
        &self,
        parent: Option<&Reference>,
        reference: &Reference,
        element: Referable,
    ) -> Result<Referable, PersistenceError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let stored = match (target(reference)?, element) {
            (Target::Element { submodel_id, .. }, Referable::SubmodelElement(element)) => {
                let mut submodel = load_submodel(&tx, submodel_id)?;
                let element = put_element(&mut submodel, parent, reference, element)?;
                store(&tx, SUBMODEL, submodel_id, &submodel)?;
                Referable::SubmodelElement(element)
            }
            (_, referable) => {
                check_identifiable(reference, &referable)?;
                match &referable {
                    Referable::Shell(shell) => store(&tx, SHELL, &shell.id, shell)?,
                    Referable::Submodel(submodel) => store(&tx, SUBMODEL, &submodel.id, submodel)?,
                    Referable::SubmodelElement(element) => {
                        return Err(PersistenceError::InvalidElement(format!(
                            "{} is not an identifiable",
                            element.id_short
                        )))
                    }
                }
                referable
            }
        };
        tx.commit()?;
        Ok(stored)
    }

    fn remove(&self, reference: &Reference) -> Result<Referable, PersistenceError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let removed = match target(reference)? {
            Target::Shell(id) => {
                let shell: AssetAdministrationShell =
                    load(&tx, SHELL, id)?.ok_or_else(|| not_found(reference))?;
                delete(&tx, SHELL, id)?;
                Referable::Shell(shell)
            }
            Target::Submodel(id) => {
                let submodel = load_submodel(&tx, id)?;
                delete(&tx, SUBMODEL, id)?;
                Referable::Submodel(submodel)
            }
            Target::Element { submodel_id, path } => {
                let mut submodel = load_submodel(&tx, submodel_id)?;
                let element = submodel
                    .remove_element(path)
                    .ok_or_else(|| not_found(reference))?;
                store(&tx, SUBMODEL, submodel_id, &submodel)?;
                Referable::SubmodelElement(element)
            }
        };
        tx.commit()?;
        Ok(removed)
    }

    fn get_operation_result(&self, handle_id: &str) -> Result<OperationResult, PersistenceError> {
        let conn = self.conn.lock();
        let bytes: Option<Vec<u8>> = conn
            .query_row(
                "SELECT payload FROM operation_results WHERE handle_id = ?1",
                [handle_id],
                |row| row.get(0),
            )
            .optional()?;
        let bytes = bytes
            .ok_or_else(|| PersistenceError::NotFound(format!("operation handle {handle_id}")))?;
        decode(&bytes)
    }

    fn put_operation_context(
        &self,
        handle_id: Option<&str>,
        request_id: &str,
        result: OperationResult,
    ) -> Result<OperationHandle, PersistenceError> {
        let handle = new_handle(handle_id, request_id);
        let conn = self.conn.lock();
        conn.execute(
            r"
            INSERT OR REPLACE INTO operation_results (handle_id, request_id, payload, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
            (&handle.handle_id, request_id, encode(&result)?, now()),
        )?;
        Ok(handle)
    }
}
