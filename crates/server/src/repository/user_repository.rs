use crate::entity::user;
use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use goj_core::domain::UserId;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub mail: String,
    pub pass_num: i64,
    pub submit_num: i64,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub mail: String,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Mail addresses identify accounts; a second account with the same mail is refused.
    async fn create(&self, new_user: NewUser) -> Result<UserRecord>;
    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>>;
    async fn find_by_mail(&self, mail: &str) -> Result<Option<UserRecord>>;
}

#[derive(Clone)]
pub struct SeaOrmUserRepository {
    db: DatabaseConnection,
}

impl SeaOrmUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn map_model(model: user::Model) -> Result<UserRecord> {
        let id = UserId::from_str(&model.id)
            .map_err(|e| anyhow!("invalid user.id '{}' from database: {e}", model.id))?;

        Ok(UserRecord {
            id,
            name: model.name,
            mail: model.mail,
            pass_num: model.pass_num,
            submit_num: model.submit_num,
        })
    }
}

#[async_trait]
impl UserRepository for SeaOrmUserRepository {
    async fn create(&self, new_user: NewUser) -> Result<UserRecord> {
        if self.find_by_mail(&new_user.mail).await?.is_some() {
            bail!("mail '{}' is already registered", new_user.mail);
        }
        let id = UserId::new();

        let active_model = user::ActiveModel {
            id: Set(id.to_string()),
            name: Set(new_user.name),
            mail: Set(new_user.mail),
            pass_num: Set(0),
            submit_num: Set(0),
            ..Default::default()
        };

        let model = active_model.insert(&self.db).await?;
        Self::map_model(model)
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>> {
        let model = user::Entity::find_by_id(user_id.to_string())
            .one(&self.db)
            .await?;

        model.map(Self::map_model).transpose()
    }

    async fn find_by_mail(&self, mail: &str) -> Result<Option<UserRecord>> {
        let model = user::Entity::find()
            .filter(user::Column::Mail.eq(mail))
            .one(&self.db)
            .await?;

        model.map(Self::map_model).transpose()
    }
}
