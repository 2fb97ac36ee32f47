//! Domain services. Each holds the connection pool and the request's
//! cancellation token; every store call goes through [`crate::store::guard`].

pub mod channel;
pub mod message;
pub mod session;
pub mod user;
pub mod workspace;

use sea_orm::{ColumnTrait, Condition};

use crate::error::AppError;
use crate::models::shared::EntityRef;

/// Filter selecting the row an [`EntityRef`] points at.
pub(crate) fn ref_condition<C: ColumnTrait>(
    target: &EntityRef,
    id_col: C,
    uuid_col: C,
) -> Result<Condition, AppError> {
    Ok(match target {
        EntityRef::Internal(id) => Condition::all().add(id_col.eq(*id)),
        EntityRef::External(s) => Condition::all().add(uuid_col.eq(common::ids::decode(s)?)),
    })
}
