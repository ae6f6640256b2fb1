//! 评论树（arena + id 索引）
//!
//! 节点存放在一个 Vec 中，父子关系用下标表示；插入回复只需要一次查找和一次 push。

use crate::pulse::error::AppError;
use crate::pulse::models::Comment;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Node {
    comment: Comment,
    parent: Option<usize>,
    children: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct CommentTree {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    roots: Vec<usize>,
}

impl CommentTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按给定顺序建树；父评论不存在或会形成环的回复提升为根
    pub fn from_comments(comments: Vec<Comment>) -> Self {
        let mut tree = Self::new();
        for comment in comments {
            let index = tree.nodes.len();
            tree.index.insert(comment.id.clone(), index);
            tree.nodes.push(Node {
                comment,
                parent: None,
                children: Vec::new(),
            });
        }
        for index in 0..tree.nodes.len() {
            let parent = tree.nodes[index]
                .comment
                .parent_id
                .as_ref()
                .and_then(|id| tree.index.get(id).copied())
                .filter(|parent| !tree.is_ancestor_or_self(index, *parent));
            match parent {
                Some(parent) => {
                    tree.nodes[index].parent = Some(parent);
                    tree.nodes[parent].children.push(index);
                }
                None => tree.roots.push(index),
            }
        }
        tree
    }

    /// `node` 是否就是 `start`，或者在 `start` 的祖先链上
    ///
    /// 已连接的边始终构成森林，所以沿 parent 向上一定会终止。
    fn is_ancestor_or_self(&self, node: usize, start: usize) -> bool {
        let mut current = Some(start);
        while let Some(index) = current {
            if index == node {
                return true;
            }
            current = self.nodes[index].parent;
        }
        false
    }

    /// 插入一条评论；回复的父评论必须已经在树中
    pub fn insert(&mut self, comment: Comment) -> Result<(), AppError> {
        if self.index.contains_key(&comment.id) {
            return Ok(());
        }
        let parent = match &comment.parent_id {
            Some(parent_id) => Some(self.index.get(parent_id).copied().ok_or_else(|| {
                AppError::not_found("Commentaire parent introuvable").with_details(parent_id.clone())
            })?),
            None => None,
        };

        let index = self.nodes.len();
        self.index.insert(comment.id.clone(), index);
        self.nodes.push(Node {
            comment,
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(parent) => self.nodes[parent].children.push(index),
            None => self.roots.push(index),
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Comment> {
        self.index.get(id).map(|&index| &self.nodes[index].comment)
    }

    pub fn roots(&self) -> Vec<&Comment> {
        self.roots
            .iter()
            .map(|&index| &self.nodes[index].comment)
            .collect()
    }

    /// 直接回复
    pub fn replies(&self, id: &str) -> Vec<&Comment> {
        self.index
            .get(id)
            .map(|&index| {
                self.nodes[index]
                    .children
                    .iter()
                    .map(|&child| &self.nodes[child].comment)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 根评论深度为 0
    pub fn depth(&self, id: &str) -> Option<usize> {
        let mut index = *self.index.get(id)?;
        let mut depth = 0;
        while let Some(parent) = self.nodes[index].parent {
            depth += 1;
            index = parent;
        }
        Some(depth)
    }

    /// 深度优先遍历，返回 (深度, 评论)
    pub fn walk(&self) -> Vec<(usize, &Comment)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, usize)> = self.roots.iter().rev().map(|&i| (0, i)).collect();
        while let Some((depth, index)) = stack.pop() {
            let node = &self.nodes[index];
            out.push((depth, &node.comment));
            for &child in node.children.iter().rev() {
                stack.push((depth + 1, child));
            }
        }
        out
    }
}
