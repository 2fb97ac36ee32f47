use common::{Stamp, Status, cursor};
use sea_orm::sea_query::{Expr, ExprTrait, Query as SeaQuery};
use sea_orm::*;
use tokio_util::sync::CancellationToken;

use crate::entity::{Stamped, channel, workspace, workspace_chd};
use crate::error::AppError;
use crate::models::shared::EntityRef;
use crate::services::ref_condition;
use crate::store::{self, StoreResultExt, guard};

/// Workspaces and their parent/child hierarchy.
pub struct WorkspaceService<'a> {
    db: &'a DatabaseConnection,
    cancel: &'a CancellationToken,
}

fn not_found() -> AppError {
    AppError::NotFound("Workspace not found".into())
}

/// Filter for active rows of a workspace reference.
pub(crate) fn active_ref(target: &EntityRef) -> Result<Select<workspace::Entity>, AppError> {
    let cond = ref_condition(target, workspace::Column::Id, workspace::Column::Uuid)?;
    Ok(workspace::Entity::find()
        .filter(cond)
        .filter(workspace::Column::Status.eq(Status::Active)))
}

impl<'a> WorkspaceService<'a> {
    pub fn new(db: &'a DatabaseConnection, cancel: &'a CancellationToken) -> Self {
        Self { db, cancel }
    }

    fn new_row(
        stamp: &Stamp,
        name: &str,
        description: &str,
        level: i32,
        parent_id: i64,
        owner_id: i64,
    ) -> workspace::ActiveModel {
        let mut model = workspace::ActiveModel {
            uuid: Set(common::ids::new_id()),
            name: Set(name.trim().to_owned()),
            description: Set(description.trim().to_owned()),
            num_views: Set(0),
            num_channels: Set(0),
            level: Set(level),
            parent_id: Set(parent_id),
            num_chd: Set(0),
            user_id: Set(owner_id),
            status: Set(Status::Active),
            ..Default::default()
        };
        model.stamp_created(stamp);
        model
    }

    /// Create a top-level workspace: level 0, no parent, zeroed counters.
    pub async fn create_root(
        &self,
        name: &str,
        description: &str,
        owner_id: i64,
    ) -> Result<workspace::Model, AppError> {
        let stamp = Stamp::now();
        let model = Self::new_row(&stamp, name, description, 0, 0, owner_id);
        guard(self.cancel, model.insert(self.db)).await.at(6001)
    }

    /// Create a workspace under `parent`. The child row, its edge and the
    /// parent's child count are written in one transaction with one stamp.
    /// Returns the child and the reloaded parent.
    pub async fn create_child(
        &self,
        parent: &EntityRef,
        name: &str,
        description: &str,
        owner_id: i64,
    ) -> Result<(workspace::Model, workspace::Model), AppError> {
        let stamp = Stamp::now();
        let query = active_ref(parent)?;

        let txn = store::begin(self.db, self.cancel).await.at(6010)?;
        let result: Result<(workspace::Model, workspace::Model), AppError> = async {
            let parent = guard(self.cancel, query.one(&txn))
                .await
                .at(6011)?
                .ok_or_else(|| AppError::NotFound("Parent workspace not found".into()))?;

            let child = Self::new_row(
                &stamp,
                name,
                description,
                parent.level + 1,
                parent.id,
                owner_id,
            );
            let child = guard(self.cancel, child.insert(&txn)).await.at(6012)?;

            let mut edge = workspace_chd::ActiveModel {
                uuid: Set(common::ids::new_id()),
                parent_id: Set(parent.id),
                child_id: Set(child.id),
                status: Set(Status::Active),
                ..Default::default()
            };
            edge.stamp_created(&stamp);
            guard(self.cancel, edge.insert(&txn)).await.at(6013)?;

            let bump = workspace::Entity::update_many()
                .col_expr(
                    workspace::Column::NumChd,
                    Expr::col(workspace::Column::NumChd).add(1),
                )
                .filter(workspace::Column::Id.eq(parent.id));
            let bump = crate::touch_updated!(bump, workspace, &stamp);
            guard(self.cancel, bump.exec(&txn)).await.at(6014)?;

            let parent = guard(
                self.cancel,
                workspace::Entity::find_by_id(parent.id).one(&txn),
            )
            .await
            .at(6015)?
            .ok_or_else(not_found)?;
            Ok((child, parent))
        }
        .await;
        store::finish(txn, self.cancel, 6016, result).await
    }

    pub async fn get(&self, target: &EntityRef) -> Result<workspace::Model, AppError> {
        guard(self.cancel, active_ref(target)?.one(self.db))
            .await
            .at(6020)?
            .ok_or_else(not_found)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<workspace::Model, AppError> {
        self.get(&EntityRef::Internal(id)).await
    }

    /// Parent of a child workspace. A root has none.
    pub async fn get_parent(&self, target: &EntityRef) -> Result<workspace::Model, AppError> {
        let child = self.get(target).await?;
        if child.parent_id == 0 {
            return Err(AppError::NotFound("Workspace has no parent".into()));
        }
        self.get_by_id(child.parent_id).await
    }

    /// Active children through the edge table, in creation order.
    pub async fn list_children(
        &self,
        target: &EntityRef,
    ) -> Result<Vec<workspace::Model>, AppError> {
        let parent = self.get(target).await?;
        let edges = SeaQuery::select()
            .column(workspace_chd::Column::ChildId)
            .from(workspace_chd::Entity)
            .and_where(workspace_chd::Column::ParentId.eq(parent.id))
            .and_where(workspace_chd::Column::Status.eq(Status::Active))
            .to_owned();
        guard(
            self.cancel,
            workspace::Entity::find()
                .filter(workspace::Column::Id.in_subquery(edges))
                .filter(workspace::Column::Status.eq(Status::Active))
                .order_by_asc(workspace::Column::Id)
                .all(self.db),
        )
        .await
        .at(6030)
    }

    pub async fn list_top_level(&self) -> Result<Vec<workspace::Model>, AppError> {
        guard(
            self.cancel,
            workspace::Entity::find()
                .filter(workspace::Column::Level.eq(0))
                .filter(workspace::Column::ParentId.eq(0))
                .filter(workspace::Column::Status.eq(Status::Active))
                .order_by_asc(workspace::Column::Id)
                .all(self.db),
        )
        .await
        .at(6031)
    }

    /// The workspace and its active channels; no pagination.
    pub async fn get_with_channels(
        &self,
        target: &EntityRef,
    ) -> Result<(workspace::Model, Vec<channel::Model>), AppError> {
        let ws = self.get(target).await?;
        let channels = guard(
            self.cancel,
            channel::Entity::find()
                .filter(channel::Column::WorkspaceId.eq(ws.id))
                .filter(channel::Column::Status.eq(Status::Active))
                .order_by_asc(channel::Column::Id)
                .all(self.db),
        )
        .await
        .at(6032)?;
        Ok((ws, channels))
    }

    /// One page of active workspaces, newest first.
    pub async fn list(
        &self,
        limit: u64,
        after: &str,
    ) -> Result<(Vec<workspace::Model>, String), AppError> {
        let upper = cursor::decode(after)?;
        let rows = guard(
            self.cancel,
            workspace::Entity::find()
                .filter(workspace::Column::Id.lte(upper))
                .filter(workspace::Column::Status.eq(Status::Active))
                .order_by_desc(workspace::Column::Id)
                .limit(limit)
                .all(self.db),
        )
        .await
        .at(6040)?;
        let next = cursor::next(rows.last().map(|w| w.id));
        Ok((rows, next))
    }

    pub async fn update(
        &self,
        target: &EntityRef,
        name: &str,
        description: &str,
    ) -> Result<workspace::Model, AppError> {
        let stamp = Stamp::now();
        let query = active_ref(target)?;
        let txn = store::begin(self.db, self.cancel).await.at(6050)?;
        let result: Result<workspace::Model, AppError> = async {
            let ws = guard(self.cancel, query.one(&txn))
                .await
                .at(6051)?
                .ok_or_else(not_found)?;
            let mut active: workspace::ActiveModel = ws.into();
            active.name = Set(name.trim().to_owned());
            active.description = Set(description.trim().to_owned());
            active.stamp_updated(&stamp);
            guard(self.cancel, active.update(&txn)).await.at(6052)
        }
        .await;
        store::finish(txn, self.cancel, 6053, result).await
    }

    /// Soft delete. Counters on the parent stay as they are.
    pub async fn delete(&self, target: &EntityRef) -> Result<(), AppError> {
        let stamp = Stamp::now();
        let ws = self.get(target).await?;
        let query = workspace::Entity::update_many()
            .col_expr(workspace::Column::Status, Expr::value(Status::Inactive))
            .filter(workspace::Column::Id.eq(ws.id))
            .filter(workspace::Column::Status.eq(Status::Active));
        let query = crate::touch_updated!(query, workspace, &stamp);
        let res = guard(self.cancel, query.exec(self.db)).await.at(6060)?;
        if res.rows_affected == 0 {
            return Err(not_found());
        }
        Ok(())
    }

    /// Recompute `num_chd` from the active edges of a workspace.
    pub async fn recount_children(&self, target: &EntityRef) -> Result<workspace::Model, AppError> {
        let stamp = Stamp::now();
        let query = active_ref(target)?;
        let txn = store::begin(self.db, self.cancel).await.at(6070)?;
        let result: Result<workspace::Model, AppError> = async {
            let ws = guard(self.cancel, query.one(&txn))
                .await
                .at(6071)?
                .ok_or_else(not_found)?;
            let edges = guard(
                self.cancel,
                workspace_chd::Entity::find()
                    .filter(workspace_chd::Column::ParentId.eq(ws.id))
                    .filter(workspace_chd::Column::Status.eq(Status::Active))
                    .count(&txn),
            )
            .await
            .at(6072)?;
            let mut active: workspace::ActiveModel = ws.into();
            active.num_chd = Set(edges as i64);
            active.stamp_updated(&stamp);
            guard(self.cancel, active.update(&txn)).await.at(6073)
        }
        .await;
        store::finish(txn, self.cancel, 6074, result).await
    }
}
