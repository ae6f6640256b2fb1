use super::CollectionBinding;
use crate::pulse::error::AppError;
use crate::pulse::models::{Group, GroupDraft, GroupPatch};

impl CollectionBinding<Group> {
    /// 创建群组，创建者是第一个成员
    pub async fn create_group(
        &self,
        owner_id: &str,
        name: &str,
        description: &str,
    ) -> Result<Group, AppError> {
        self.create(GroupDraft {
            name: name.to_string(),
            description: description.to_string(),
            owner_id: owner_id.to_string(),
            members: vec![owner_id.to_string()],
        })
        .await
    }

    /// 加入群组；已经是成员时不做任何修改
    pub async fn join_group(&self, group_id: &str, user_id: &str) -> Result<Group, AppError> {
        let group = self.require_item("join_group", group_id).await?;
        if group.is_member(user_id) {
            return Ok(group);
        }
        let mut members = group.members;
        members.push(user_id.to_string());
        self.update(
            group_id,
            GroupPatch {
                members: Some(members),
                ..Default::default()
            },
        )
        .await
    }

    /// 离开群组；不是成员时不做任何修改
    pub async fn leave_group(&self, group_id: &str, user_id: &str) -> Result<Group, AppError> {
        let group = self.require_item("leave_group", group_id).await?;
        if !group.is_member(user_id) {
            return Ok(group);
        }
        let members = group
            .members
            .into_iter()
            .filter(|member| member != user_id)
            .collect();
        self.update(
            group_id,
            GroupPatch {
                members: Some(members),
                ..Default::default()
            },
        )
        .await
    }
}
