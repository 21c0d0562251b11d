//! Command documents issued during topology formation.

use serde_json::{Value, json};

use crate::client::Document;
use crate::core::ReplicaSetSpec;
use crate::error::ClientError;

/// Database administrative commands are sent to.
pub const ADMIN_DB: &str = "admin";

/// Collection created to materialize the target database.
///
/// There is no explicit "create database" command; a database exists once it
/// holds a collection.
pub const PLACEHOLDER_COLLECTION: &str = "_init";

/// `replSetInitiate` with every member of `rs`; member `_id` is its index.
pub fn replset_initiate(rs: &ReplicaSetSpec) -> Document {
    let members: Vec<Document> = rs
        .members()
        .iter()
        .enumerate()
        .map(|(id, host)| json!({ "_id": id, "host": host.to_string() }))
        .collect();
    json!({
        "replSetInitiate": {
            "_id": rs.name(),
            "members": members,
        }
    })
}

/// `addShard` for the replica set `rs`.
pub fn add_shard(rs: &ReplicaSetSpec) -> Document {
    json!({ "addShard": rs.seed_list() })
}

/// `enableSharding` for database `db`.
pub fn enable_sharding(db: &str) -> Document {
    json!({ "enableSharding": db })
}

/// Name of a command document (its first key), for error reporting.
pub fn command_name(command: &Document) -> &str {
    command
        .as_object()
        .and_then(|m| m.keys().next())
        .map(String::as_str)
        .unwrap_or("unknown")
}

/// Maps an `{ "ok": 0, "errmsg": ... }` reply of command `name` onto [`ClientError::Command`].
///
/// Replies without an `ok` field are passed through; drivers that already
/// turn failures into errors never produce them.
pub fn check_reply(name: &str, reply: Document) -> Result<Document, ClientError> {
    match reply.get("ok").and_then(Value::as_f64) {
        Some(ok) if ok == 0.0 => Err(ClientError::Command {
            command: name.to_string(),
            message: reply
                .get("errmsg")
                .and_then(Value::as_str)
                .unwrap_or("command failed")
                .to_string(),
        }),
        _ => Ok(reply),
    }
}
