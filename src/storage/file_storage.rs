use crate::{
    auth::OrganizationId,
    config::TrackerConfig,
    domain::{
        sort_for_board, Issue, IssueId, IssueOrderUpdate, IssueStatus, IssueUpdate, Project,
        ProjectId, Sprint, SprintId, SprintUpdate,
    },
    error::{Result, SprintboardError},
    storage::Storage,
};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// File-based storage implementation.
///
/// Every entity is one pretty-printed JSON document named after its id.
pub struct FileStorage {
    root_path: PathBuf,
}

impl FileStorage {
    const DATA_DIR: &'static str = ".sprintboard";
    const PROJECTS_DIR: &'static str = "projects";
    const SPRINTS_DIR: &'static str = "sprints";
    const ISSUES_DIR: &'static str = "issues";
    const CONFIG_FILE: &'static str = "config.toml";
    const STAGING_EXT: &'static str = "staged";
    const BACKUP_EXT: &'static str = "backup";

    /// Creates a new FileStorage instance rooted at `root`
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root_path: root.as_ref().join(Self::DATA_DIR),
        }
    }

    fn projects_dir(&self) -> PathBuf {
        self.root_path.join(Self::PROJECTS_DIR)
    }

    fn sprints_dir(&self) -> PathBuf {
        self.root_path.join(Self::SPRINTS_DIR)
    }

    fn issues_dir(&self) -> PathBuf {
        self.root_path.join(Self::ISSUES_DIR)
    }

    fn config_file(&self) -> PathBuf {
        self.root_path.join(Self::CONFIG_FILE)
    }

    fn project_file(&self, id: &ProjectId) -> PathBuf {
        self.projects_dir().join(format!("{}.json", id))
    }

    fn sprint_file(&self, id: &SprintId) -> PathBuf {
        self.sprints_dir().join(format!("{}.json", id))
    }

    fn issue_file(&self, id: &IssueId) -> PathBuf {
        self.issues_dir().join(format!("{}.json", id))
    }

    /// Reads `config.toml` from the data directory, falling back to defaults
    pub async fn load_config(&self) -> Result<TrackerConfig> {
        let path = self.config_file();
        if !path.exists() {
            return Ok(TrackerConfig::default());
        }
        TrackerConfig::load(path).await
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).await?;
        }
        Ok(())
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.ensure_directory_exists(parent).await?;
        }
        let json = serde_json::to_string_pretty(value)?;
        fs::write(path, json).await?;
        Ok(())
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path).await?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    async fn read_all<T: DeserializeOwned>(&self, dir: &Path) -> Result<Vec<T>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(dir).await?;
        let mut items = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                let contents = fs::read_to_string(&path).await?;
                items.push(serde_json::from_str(&contents)?);
            }
        }

        Ok(items)
    }

    async fn all_issues(&self) -> Result<Vec<Issue>> {
        self.read_all(&self.issues_dir()).await
    }

    async fn remove_files(&self, paths: &[PathBuf]) {
        for path in paths {
            if let Err(e) = fs::remove_file(path).await {
                tracing::debug!(path = %path.display(), error = %e, "failed to remove batch file");
            }
        }
    }

    /// Moves each `(staging, target)` pair into place.
    ///
    /// Every target is backed up first. If a rename fails, the targets
    /// already replaced are restored from their backups and all leftover
    /// batch files are removed.
    async fn commit_staged(&self, staged: &[(PathBuf, PathBuf)]) -> Result<()> {
        let staging: Vec<PathBuf> = staged.iter().map(|(s, _)| s.clone()).collect();

        let mut backups = Vec::with_capacity(staged.len());
        for (_, target) in staged {
            let backup = target.with_extension(Self::BACKUP_EXT);
            if let Err(e) = fs::copy(target, &backup).await {
                self.remove_files(&backups).await;
                self.remove_files(&staging).await;
                return Err(e.into());
            }
            backups.push(backup);
        }

        for (index, (staged_file, target)) in staged.iter().enumerate() {
            if let Err(e) = fs::rename(staged_file, target).await {
                for (backup, (_, replaced)) in backups.iter().zip(staged).take(index) {
                    if let Err(restore) = fs::rename(backup, replaced).await {
                        tracing::warn!(
                            path = %replaced.display(),
                            error = %restore,
                            "failed to restore issue after aborted batch"
                        );
                    }
                }
                self.remove_files(&backups[index..]).await;
                self.remove_files(&staging[index..]).await;
                return Err(e.into());
            }
        }

        self.remove_files(&backups).await;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn initialize(&self) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;
        self.ensure_directory_exists(&self.projects_dir()).await?;
        self.ensure_directory_exists(&self.sprints_dir()).await?;
        self.ensure_directory_exists(&self.issues_dir()).await?;

        let gitignore_path = self.root_path.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(gitignore_path, "# Interrupted batch writes\n*.staged\n*.backup\n").await?;
        }

        tracing::debug!(root = %self.root_path.display(), "file storage initialized");
        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        self.projects_dir().exists() && self.sprints_dir().exists() && self.issues_dir().exists()
    }

    async fn save_project(&self, project: &Project) -> Result<()> {
        self.write_json(&self.project_file(&project.id), project).await
    }

    async fn load_project(&self, id: &ProjectId) -> Result<Project> {
        self.read_json(&self.project_file(id))
            .await?
            .ok_or_else(|| SprintboardError::ProjectNotFound(id.to_string()))
    }

    async fn list_projects(&self, organization_id: &OrganizationId) -> Result<Vec<Project>> {
        let mut projects: Vec<Project> = self.read_all(&self.projects_dir()).await?;
        projects.retain(|p| p.belongs_to(organization_id));
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn find_project_by_key(&self, key: &str) -> Result<Option<Project>> {
        let projects: Vec<Project> = self.read_all(&self.projects_dir()).await?;
        Ok(projects
            .into_iter()
            .find(|p| p.key.eq_ignore_ascii_case(key.trim())))
    }

    async fn delete_project(&self, id: &ProjectId) -> Result<()> {
        let file_path = self.project_file(id);
        if !file_path.exists() {
            return Err(SprintboardError::ProjectNotFound(id.to_string()));
        }

        for issue in self.list_issues_for_project(id).await? {
            fs::remove_file(self.issue_file(&issue.id)).await?;
        }
        for sprint in self.list_sprints(id).await? {
            fs::remove_file(self.sprint_file(&sprint.id)).await?;
        }
        fs::remove_file(file_path).await?;
        Ok(())
    }

    async fn save_sprint(&self, sprint: &Sprint) -> Result<()> {
        self.write_json(&self.sprint_file(&sprint.id), sprint).await
    }

    async fn load_sprint(&self, id: &SprintId) -> Result<Sprint> {
        self.read_json(&self.sprint_file(id))
            .await?
            .ok_or_else(|| SprintboardError::SprintNotFound(id.to_string()))
    }

    async fn list_sprints(&self, project_id: &ProjectId) -> Result<Vec<Sprint>> {
        let mut sprints: Vec<Sprint> = self.read_all(&self.sprints_dir()).await?;
        sprints.retain(|s| &s.project_id == project_id);
        sprints.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sprints)
    }

    async fn update_sprint(&self, id: &SprintId, update: &SprintUpdate) -> Result<Sprint> {
        let mut sprint = self.load_sprint(id).await?;
        update.apply_to(&mut sprint);
        self.save_sprint(&sprint).await?;
        Ok(sprint)
    }

    async fn create_issue(&self, issue: &Issue) -> Result<()> {
        self.write_json(&self.issue_file(&issue.id), issue).await
    }

    async fn load_issue(&self, id: &IssueId) -> Result<Issue> {
        self.read_json(&self.issue_file(id))
            .await?
            .ok_or_else(|| SprintboardError::IssueNotFound(id.to_string()))
    }

    async fn update_issue(&self, id: &IssueId, update: &IssueUpdate) -> Result<Issue> {
        let mut issue = self.load_issue(id).await?;
        update.apply_to(&mut issue);
        self.write_json(&self.issue_file(id), &issue).await?;
        Ok(issue)
    }

    async fn delete_issue(&self, id: &IssueId) -> Result<()> {
        let file_path = self.issue_file(id);

        if !file_path.exists() {
            return Err(SprintboardError::IssueNotFound(id.to_string()));
        }

        fs::remove_file(file_path).await?;
        Ok(())
    }

    async fn list_issues_for_sprint(&self, sprint_id: &SprintId) -> Result<Vec<Issue>> {
        let mut issues = self.all_issues().await?;
        issues.retain(|i| &i.sprint_id == sprint_id);
        sort_for_board(&mut issues);
        Ok(issues)
    }

    async fn list_issues_for_project(&self, project_id: &ProjectId) -> Result<Vec<Issue>> {
        let mut issues = self.all_issues().await?;
        issues.retain(|i| &i.project_id == project_id);
        Ok(issues)
    }

    async fn find_issues_by_sprint_and_status(
        &self,
        sprint_id: &SprintId,
        status: IssueStatus,
    ) -> Result<Vec<Issue>> {
        let mut issues = self.all_issues().await?;
        issues.retain(|i| &i.sprint_id == sprint_id && i.status == status);
        issues.sort_by_key(|i| i.order);
        Ok(issues)
    }

    async fn update_issue_orders(&self, updates: &[IssueOrderUpdate]) -> Result<()> {
        // Resolve every row before touching disk so a missing issue aborts the batch
        let mut pending = Vec::with_capacity(updates.len());
        for update in updates {
            let mut issue = self.load_issue(&update.id).await?;
            IssueUpdate {
                status: Some(update.status),
                order: Some(update.order),
                priority: update.priority,
                ..IssueUpdate::default()
            }
            .apply_to(&mut issue);
            pending.push(issue);
        }

        let mut staged = Vec::with_capacity(pending.len());
        for issue in &pending {
            let target = self.issue_file(&issue.id);
            let staging = target.with_extension(Self::STAGING_EXT);
            let written = match serde_json::to_string_pretty(issue) {
                Ok(json) => fs::write(&staging, json).await.map_err(SprintboardError::from),
                Err(e) => Err(e.into()),
            };
            if let Err(e) = written {
                let mut leftovers: Vec<PathBuf> = staged.iter().map(|(s, _)| s).cloned().collect();
                leftovers.push(staging);
                self.remove_files(&leftovers).await;
                return Err(e);
            }
            staged.push((staging, target));
        }

        self.commit_staged(&staged).await?;

        tracing::debug!(rows = staged.len(), "issue order batch committed");
        Ok(())
    }
}
