use chrono::{Duration, Utc};
use common::{Stamp, Status, UserState};
use sea_orm::*;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::entity::{Stamped, user};
use crate::error::AppError;
use crate::extractors::auth::AuthUser;
use crate::mailer::{Mail, Mailer};
use crate::models::shared::EntityRef;
use crate::services::ref_condition;
use crate::store::{self, StoreResultExt, guard};
use crate::utils::{hash, tokens};

/// Outcome of redeeming a confirmation token.
#[derive(Debug)]
pub struct Confirmation {
    pub user: user::Model,
    /// Set when the redemption completed an email change.
    pub previous_email: Option<String>,
}

/// User directory and account lifecycle.
pub struct UserService<'a> {
    db: &'a DatabaseConnection,
    cancel: &'a CancellationToken,
}

fn token_rejected() -> AppError {
    AppError::Validation("Token is invalid or expired".into())
}

async fn deliver(mailer: &dyn Mailer, mail: Mail) -> Result<(), AppError> {
    mailer
        .send(mail)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}

fn password_hash(password: &str) -> Result<String, AppError> {
    hash::hash_password(password)
        .map_err(|e| AppError::Internal(format!("Password hash error: {e}")))
}

impl<'a> UserService<'a> {
    pub fn new(db: &'a DatabaseConnection, cancel: &'a CancellationToken) -> Self {
        Self { db, cancel }
    }

    fn active() -> Select<user::Entity> {
        user::Entity::find().filter(user::Column::Status.eq(Status::Active))
    }

    pub async fn get_by_uuid(&self, uuid: Uuid) -> Result<user::Model, AppError> {
        guard(
            self.cancel,
            Self::active().filter(user::Column::Uuid.eq(uuid)).one(self.db),
        )
        .await
        .at(5001)?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    pub async fn get_by_ref(&self, target: &EntityRef) -> Result<user::Model, AppError> {
        let cond = ref_condition(target, user::Column::Id, user::Column::Uuid)?;
        guard(self.cancel, Self::active().filter(cond).one(self.db))
            .await
            .at(5002)?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    pub async fn get_by_email(&self, email: &str) -> Result<user::Model, AppError> {
        guard(
            self.cancel,
            Self::active()
                .filter(user::Column::Email.eq(email))
                .one(self.db),
        )
        .await
        .at(5003)?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    /// Internal id of an authenticated principal. A principal whose row has
    /// since gone away no longer authenticates.
    pub async fn internal_id(&self, principal: &AuthUser) -> Result<i64, AppError> {
        match self.get_by_uuid(principal.user_id).await {
            Ok(user) => Ok(user.id),
            Err(AppError::NotFound(_)) => Err(AppError::TokenInvalid),
            Err(e) => Err(e),
        }
    }

    /// Create an unconfirmed account and mail its confirmation token.
    pub async fn register(
        &self,
        mailer: &dyn Mailer,
        email: &str,
        password: &str,
        role: &str,
        confirm_ttl: Duration,
    ) -> Result<user::Model, AppError> {
        let password = password_hash(password)?;
        let issued = tokens::issue();
        let stamp = Stamp::now();

        let txn = store::begin(self.db, self.cancel).await.at(5010)?;
        let result: Result<user::Model, AppError> = async {
            let taken = guard(
                self.cancel,
                user::Entity::find()
                    .filter(user::Column::Email.eq(email))
                    .one(&txn),
            )
            .await
            .at(5011)?;
            if taken.is_some() {
                return Err(AppError::Conflict("Email is already registered".into()));
            }

            let mut model = user::ActiveModel {
                uuid: Set(common::ids::new_id()),
                email: Set(email.to_owned()),
                new_email: Set(None),
                password: Set(password),
                role: Set(role.to_owned()),
                state: Set(UserState::Unconfirmed),
                confirm_selector: Set(Some(issued.selector.clone())),
                confirm_verifier_hash: Set(Some(issued.verifier_hash.clone())),
                confirm_expires_at: Set(Some(stamp.at + confirm_ttl)),
                reset_selector: Set(None),
                reset_verifier_hash: Set(None),
                reset_expires_at: Set(None),
                status: Set(Status::Active),
                ..Default::default()
            };
            model.stamp_created(&stamp);
            let user = guard(self.cancel, model.insert(&txn)).await.at(5012)?;

            deliver(
                mailer,
                Mail::Confirm {
                    to: user.email.clone(),
                    token: issued.token.clone(),
                },
            )
            .await?;
            Ok(user)
        }
        .await;
        store::finish(txn, self.cancel, 5013, result).await
    }

    /// Redeem a confirmation token: completes registration or a pending
    /// email change.
    pub async fn confirm(&self, token: &str) -> Result<Confirmation, AppError> {
        let presented = tokens::parse(token).map_err(|_| token_rejected())?;
        let now = Utc::now();
        let stamp = Stamp::at(now);

        let txn = store::begin(self.db, self.cancel).await.at(5020)?;
        let result: Result<Confirmation, AppError> = async {
            let user = guard(
                self.cancel,
                Self::active()
                    .filter(user::Column::ConfirmSelector.eq(presented.selector.as_str()))
                    .one(&txn),
            )
            .await
            .at(5021)?
            .ok_or_else(token_rejected)?;
            let (Some(stored), Some(expires_at)) =
                (user.confirm_verifier_hash.as_deref(), user.confirm_expires_at)
            else {
                return Err(token_rejected());
            };
            presented
                .check(stored, expires_at, now)
                .map_err(|_| token_rejected())?;

            let mut active: user::ActiveModel = user.clone().into();
            let mut previous_email = None;
            match user.state {
                UserState::Unconfirmed => {}
                UserState::ChangingEmail => {
                    let new_email = user
                        .new_email
                        .clone()
                        .ok_or_else(|| AppError::Conflict("No email change is pending".into()))?;
                    let taken = guard(
                        self.cancel,
                        user::Entity::find()
                            .filter(user::Column::Email.eq(new_email.as_str()))
                            .filter(user::Column::Id.ne(user.id))
                            .one(&txn),
                    )
                    .await
                    .at(5022)?;
                    if taken.is_some() {
                        return Err(AppError::Conflict("Email is already registered".into()));
                    }
                    previous_email = Some(user.email.clone());
                    active.email = Set(new_email);
                    active.new_email = Set(None);
                }
                _ => {
                    return Err(AppError::Conflict(
                        "Account cannot be confirmed in its current state".into(),
                    ));
                }
            }
            active.state = Set(UserState::Confirmed);
            active.confirm_selector = Set(None);
            active.confirm_verifier_hash = Set(None);
            active.confirm_expires_at = Set(None);
            active.stamp_updated(&stamp);
            let user = guard(self.cancel, active.update(&txn)).await.at(5023)?;
            Ok(Confirmation {
                user,
                previous_email,
            })
        }
        .await;
        store::finish(txn, self.cancel, 5024, result).await
    }

    /// Start an email change: the new address receives a confirmation token
    /// and the account moves to `ChangingEmail` until it is redeemed.
    pub async fn change_email(
        &self,
        mailer: &dyn Mailer,
        user_id: i64,
        new_email: &str,
        confirm_ttl: Duration,
    ) -> Result<user::Model, AppError> {
        let issued = tokens::issue();
        let stamp = Stamp::now();

        let txn = store::begin(self.db, self.cancel).await.at(5030)?;
        let result: Result<user::Model, AppError> = async {
            let user = guard(
                self.cancel,
                Self::active().filter(user::Column::Id.eq(user_id)).one(&txn),
            )
            .await
            .at(5031)?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
            if !matches!(user.state, UserState::Confirmed | UserState::ChangingEmail) {
                return Err(AppError::Conflict(
                    "Email can only be changed on a confirmed account".into(),
                ));
            }
            if user.email == new_email {
                return Err(AppError::Validation(
                    "New email matches the current one".into(),
                ));
            }
            let taken = guard(
                self.cancel,
                user::Entity::find()
                    .filter(user::Column::Email.eq(new_email))
                    .one(&txn),
            )
            .await
            .at(5032)?;
            if taken.is_some() {
                return Err(AppError::Conflict("Email is already registered".into()));
            }

            let mut active: user::ActiveModel = user.into();
            active.new_email = Set(Some(new_email.to_owned()));
            active.state = Set(UserState::ChangingEmail);
            active.confirm_selector = Set(Some(issued.selector.clone()));
            active.confirm_verifier_hash = Set(Some(issued.verifier_hash.clone()));
            active.confirm_expires_at = Set(Some(stamp.at + confirm_ttl));
            active.stamp_updated(&stamp);
            let user = guard(self.cancel, active.update(&txn)).await.at(5033)?;

            deliver(
                mailer,
                Mail::ChangeEmail {
                    to: new_email.to_owned(),
                    token: issued.token.clone(),
                },
            )
            .await?;
            Ok(user)
        }
        .await;
        store::finish(txn, self.cancel, 5034, result).await
    }

    /// Mail a recovery token. Unknown or inactive addresses succeed silently.
    pub async fn forgot_password(
        &self,
        mailer: &dyn Mailer,
        email: &str,
        reset_ttl: Duration,
    ) -> Result<(), AppError> {
        let issued = tokens::issue();
        let stamp = Stamp::now();

        let txn = store::begin(self.db, self.cancel).await.at(5040)?;
        let result: Result<(), AppError> = async {
            let user = guard(
                self.cancel,
                Self::active()
                    .filter(user::Column::Email.eq(email))
                    .one(&txn),
            )
            .await
            .at(5041)?;
            let Some(user) = user.filter(|u| u.state.keeps_session()) else {
                debug!("Recovery requested for an unknown or inactive account");
                return Ok(());
            };

            let mut active: user::ActiveModel = user.into();
            active.reset_selector = Set(Some(issued.selector.clone()));
            active.reset_verifier_hash = Set(Some(issued.verifier_hash.clone()));
            active.reset_expires_at = Set(Some(stamp.at + reset_ttl));
            active.stamp_updated(&stamp);
            guard(self.cancel, active.update(&txn)).await.at(5042)?;

            deliver(
                mailer,
                Mail::ResetPassword {
                    to: email.to_owned(),
                    token: issued.token.clone(),
                },
            )
            .await
        }
        .await;
        store::finish(txn, self.cancel, 5043, result).await
    }

    /// Redeem a recovery token and set a new password. The token is single-use.
    pub async fn reset_password(
        &self,
        token: &str,
        password: &str,
    ) -> Result<user::Model, AppError> {
        let presented = tokens::parse(token).map_err(|_| token_rejected())?;
        let password = password_hash(password)?;
        let now = Utc::now();
        let stamp = Stamp::at(now);

        let txn = store::begin(self.db, self.cancel).await.at(5050)?;
        let result: Result<user::Model, AppError> = async {
            let user = guard(
                self.cancel,
                Self::active()
                    .filter(user::Column::ResetSelector.eq(presented.selector.as_str()))
                    .one(&txn),
            )
            .await
            .at(5051)?
            .ok_or_else(token_rejected)?;
            let (Some(stored), Some(expires_at)) =
                (user.reset_verifier_hash.as_deref(), user.reset_expires_at)
            else {
                return Err(token_rejected());
            };
            presented
                .check(stored, expires_at, now)
                .map_err(|_| token_rejected())?;

            let mut active: user::ActiveModel = user.into();
            active.password = Set(password);
            active.reset_selector = Set(None);
            active.reset_verifier_hash = Set(None);
            active.reset_expires_at = Set(None);
            active.stamp_updated(&stamp);
            guard(self.cancel, active.update(&txn)).await.at(5052)
        }
        .await;
        store::finish(txn, self.cancel, 5053, result).await
    }

    /// Move the account to `Inactive` and soft-delete it.
    pub async fn deactivate(&self, user_id: i64) -> Result<user::Model, AppError> {
        let stamp = Stamp::now();
        let txn = store::begin(self.db, self.cancel).await.at(5060)?;
        let result: Result<user::Model, AppError> = async {
            let user = guard(
                self.cancel,
                Self::active().filter(user::Column::Id.eq(user_id)).one(&txn),
            )
            .await
            .at(5061)?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
            if !user.state.can_transition_to(UserState::Inactive) {
                return Err(AppError::Conflict(
                    "Account cannot be deactivated in its current state".into(),
                ));
            }
            let mut active: user::ActiveModel = user.into();
            active.state = Set(UserState::Inactive);
            active.status = Set(Status::Inactive);
            active.stamp_updated(&stamp);
            guard(self.cancel, active.update(&txn)).await.at(5062)
        }
        .await;
        store::finish(txn, self.cancel, 5063, result).await
    }
}
