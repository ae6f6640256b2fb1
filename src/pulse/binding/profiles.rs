use super::CollectionBinding;
use crate::pulse::error::AppError;
use crate::pulse::models::{Profile, ProfileDraft};

impl CollectionBinding<Profile> {
    /// 保存绑定用户的资料（不存在时创建）
    pub async fn save_profile(
        &self,
        username: &str,
        bio: &str,
        avatar_url: &str,
    ) -> Result<Profile, AppError> {
        let user_id = self.expect_scope_key("save_profile");
        self.upsert(ProfileDraft {
            user_id,
            username: username.to_string(),
            bio: bio.to_string(),
            avatar_url: avatar_url.to_string(),
        })
        .await
    }

    pub fn profile(&self) -> Option<Profile> {
        self.snapshot().into_iter().next()
    }
}
