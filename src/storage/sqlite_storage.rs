use crate::{
    auth::{OrganizationId, UserId},
    domain::{
        Issue, IssueId, IssueOrderUpdate, IssueStatus, IssueUpdate, Project, ProjectId, Sprint,
        SprintId, SprintUpdate,
    },
    error::{Result, SprintboardError},
    storage::Storage,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use std::{path::Path, str::FromStr, sync::Mutex};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    key TEXT NOT NULL UNIQUE,
    description TEXT,
    organization_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sprints (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'PLANNED',
    project_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS issues (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL,
    priority TEXT NOT NULL,
    sort_order INTEGER NOT NULL,
    sprint_id TEXT NOT NULL,
    project_id TEXT NOT NULL,
    reporter_id TEXT NOT NULL,
    assignee_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (sprint_id) REFERENCES sprints(id) ON DELETE CASCADE,
    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_projects_org ON projects(organization_id);
CREATE INDEX IF NOT EXISTS idx_sprints_project ON sprints(project_id);
CREATE INDEX IF NOT EXISTS idx_issues_lane ON issues(sprint_id, status, sort_order);
CREATE INDEX IF NOT EXISTS idx_issues_project ON issues(project_id);
"#;

const PROJECT_COLUMNS: &str = "id, name, key, description, organization_id, created_at, updated_at";
const SPRINT_COLUMNS: &str =
    "id, name, start_date, end_date, status, project_id, created_at, updated_at";
const ISSUE_COLUMNS: &str = "id, title, description, status, priority, sort_order, sprint_id, \
     project_id, reporter_id, assignee_id, created_at, updated_at";

// Board order: status in workflow position, then lane order
const BOARD_ORDER: &str = "CASE status WHEN 'TODO' THEN 0 WHEN 'IN_PROGRESS' THEN 1 \
     WHEN 'IN_REVIEW' THEN 2 ELSE 3 END, sort_order";

/// SQLite-based storage backend.
///
/// The connection sits behind a mutex; every call runs synchronously while
/// holding it and never across an await point.
pub struct SqliteStorage {
    connection: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens (or creates) a database file
    pub fn open(database_path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(database_path)?)
    }

    /// Opens a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            connection: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self
            .connection
            .lock()
            .map_err(|_| SprintboardError::StorageError("connection lock poisoned".to_string()))?;
        f(&mut guard)
    }
}

fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SprintboardError::StorageError(format!("bad timestamp '{}': {}", s, e)))
}

fn parse_id<T: FromStr<Err = SprintboardError>>(s: &str) -> Result<T> {
    T::from_str(s).map_err(|e| SprintboardError::StorageError(e.to_string()))
}

struct ProjectRow {
    id: String,
    name: String,
    key: String,
    description: Option<String>,
    organization_id: String,
    created_at: String,
    updated_at: String,
}

impl ProjectRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            key: row.get(2)?,
            description: row.get(3)?,
            organization_id: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn into_project(self) -> Result<Project> {
        Ok(Project {
            id: parse_id(&self.id)?,
            name: self.name,
            key: self.key,
            description: self.description,
            organization_id: OrganizationId::new(self.organization_id),
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct SprintRow {
    id: String,
    name: String,
    start_date: String,
    end_date: String,
    status: String,
    project_id: String,
    created_at: String,
    updated_at: String,
}

impl SprintRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            start_date: row.get(2)?,
            end_date: row.get(3)?,
            status: row.get(4)?,
            project_id: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_sprint(self) -> Result<Sprint> {
        Ok(Sprint {
            id: parse_id(&self.id)?,
            name: self.name,
            start_date: parse_timestamp(&self.start_date)?,
            end_date: parse_timestamp(&self.end_date)?,
            status: self.status.parse()?,
            project_id: parse_id(&self.project_id)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct IssueRow {
    id: String,
    title: String,
    description: Option<String>,
    status: String,
    priority: String,
    sort_order: i64,
    sprint_id: String,
    project_id: String,
    reporter_id: String,
    assignee_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl IssueRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            status: row.get(3)?,
            priority: row.get(4)?,
            sort_order: row.get(5)?,
            sprint_id: row.get(6)?,
            project_id: row.get(7)?,
            reporter_id: row.get(8)?,
            assignee_id: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn into_issue(self) -> Result<Issue> {
        let order = u32::try_from(self.sort_order).map_err(|_| {
            SprintboardError::StorageError(format!("bad sort order {}", self.sort_order))
        })?;
        Ok(Issue {
            id: parse_id(&self.id)?,
            title: self.title,
            description: self.description,
            status: self.status.parse()?,
            priority: self.priority.parse()?,
            order,
            sprint_id: parse_id(&self.sprint_id)?,
            project_id: parse_id(&self.project_id)?,
            reporter_id: UserId::new(self.reporter_id),
            assignee_id: self.assignee_id.map(UserId::new),
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn query_issues(conn: &Connection, sql: &str, args: impl Params) -> Result<Vec<Issue>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(args, IssueRow::read)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(IssueRow::into_issue).collect()
}

fn load_issue_row(conn: &Connection, id: &IssueId) -> Result<Issue> {
    conn.query_row(
        &format!("SELECT {} FROM issues WHERE id = ?1", ISSUE_COLUMNS),
        params![id.to_string()],
        IssueRow::read,
    )
    .optional()?
    .ok_or_else(|| SprintboardError::IssueNotFound(id.to_string()))?
    .into_issue()
}

fn load_sprint_row(conn: &Connection, id: &SprintId) -> Result<Sprint> {
    conn.query_row(
        &format!("SELECT {} FROM sprints WHERE id = ?1", SPRINT_COLUMNS),
        params![id.to_string()],
        SprintRow::read,
    )
    .optional()?
    .ok_or_else(|| SprintboardError::SprintNotFound(id.to_string()))?
    .into_sprint()
}

fn write_sprint(conn: &Connection, sprint: &Sprint) -> Result<()> {
    conn.execute(
        "INSERT INTO sprints (id, name, start_date, end_date, status, project_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            start_date = excluded.start_date,
            end_date = excluded.end_date,
            status = excluded.status,
            updated_at = excluded.updated_at",
        params![
            sprint.id.to_string(),
            sprint.name,
            timestamp(&sprint.start_date),
            timestamp(&sprint.end_date),
            sprint.status.as_str(),
            sprint.project_id.to_string(),
            timestamp(&sprint.created_at),
            timestamp(&sprint.updated_at),
        ],
    )?;
    Ok(())
}

fn write_issue_fields(conn: &Connection, issue: &Issue) -> Result<()> {
    conn.execute(
        "UPDATE issues SET status = ?1, priority = ?2, sort_order = ?3, assignee_id = ?4, updated_at = ?5
         WHERE id = ?6",
        params![
            issue.status.as_str(),
            issue.priority.as_str(),
            issue.order,
            issue.assignee_id.as_ref().map(|a| a.as_str().to_string()),
            timestamp(&issue.updated_at),
            issue.id.to_string(),
        ],
    )?;
    Ok(())
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn initialize(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(SCHEMA)?;
            tracing::debug!("sqlite schema initialized");
            Ok(())
        })
    }

    async fn is_initialized(&self) -> bool {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('projects', 'sprints', 'issues')",
                [],
                |row| row.get(0),
            )?;
            Ok(count == 3)
        })
        .unwrap_or(false)
    }

    async fn save_project(&self, project: &Project) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO projects (id, name, key, description, organization_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    key = excluded.key,
                    description = excluded.description,
                    updated_at = excluded.updated_at",
                params![
                    project.id.to_string(),
                    project.name,
                    project.key,
                    project.description,
                    project.organization_id.as_str(),
                    timestamp(&project.created_at),
                    timestamp(&project.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    async fn load_project(&self, id: &ProjectId) -> Result<Project> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLUMNS),
                params![id.to_string()],
                ProjectRow::read,
            )
            .optional()?
            .ok_or_else(|| SprintboardError::ProjectNotFound(id.to_string()))?
            .into_project()
        })
    }

    async fn list_projects(&self, organization_id: &OrganizationId) -> Result<Vec<Project>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM projects WHERE organization_id = ?1 ORDER BY created_at DESC",
                PROJECT_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![organization_id.as_str()], ProjectRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(ProjectRow::into_project).collect()
        })
    }

    async fn find_project_by_key(&self, key: &str) -> Result<Option<Project>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM projects WHERE UPPER(key) = UPPER(?1)",
                    PROJECT_COLUMNS
                ),
                params![key.trim()],
                ProjectRow::read,
            )
            .optional()?
            .map(ProjectRow::into_project)
            .transpose()
        })
    }

    async fn delete_project(&self, id: &ProjectId) -> Result<()> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM projects WHERE id = ?1", params![id.to_string()])?;
            if deleted == 0 {
                return Err(SprintboardError::ProjectNotFound(id.to_string()));
            }
            Ok(())
        })
    }

    async fn save_sprint(&self, sprint: &Sprint) -> Result<()> {
        self.with_conn(|conn| write_sprint(conn, sprint))
    }

    async fn load_sprint(&self, id: &SprintId) -> Result<Sprint> {
        self.with_conn(|conn| load_sprint_row(conn, id))
    }

    async fn list_sprints(&self, project_id: &ProjectId) -> Result<Vec<Sprint>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM sprints WHERE project_id = ?1 ORDER BY created_at DESC",
                SPRINT_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![project_id.to_string()], SprintRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(SprintRow::into_sprint).collect()
        })
    }

    async fn update_sprint(&self, id: &SprintId, update: &SprintUpdate) -> Result<Sprint> {
        self.with_conn(|conn| {
            let mut sprint = load_sprint_row(conn, id)?;
            update.apply_to(&mut sprint);
            write_sprint(conn, &sprint)?;
            Ok(sprint)
        })
    }

    async fn create_issue(&self, issue: &Issue) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO issues ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    ISSUE_COLUMNS
                ),
                params![
                    issue.id.to_string(),
                    issue.title,
                    issue.description,
                    issue.status.as_str(),
                    issue.priority.as_str(),
                    issue.order,
                    issue.sprint_id.to_string(),
                    issue.project_id.to_string(),
                    issue.reporter_id.as_str(),
                    issue.assignee_id.as_ref().map(|a| a.as_str().to_string()),
                    timestamp(&issue.created_at),
                    timestamp(&issue.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    async fn load_issue(&self, id: &IssueId) -> Result<Issue> {
        self.with_conn(|conn| load_issue_row(conn, id))
    }

    async fn update_issue(&self, id: &IssueId, update: &IssueUpdate) -> Result<Issue> {
        self.with_conn(|conn| {
            let mut issue = load_issue_row(conn, id)?;
            update.apply_to(&mut issue);
            write_issue_fields(conn, &issue)?;
            Ok(issue)
        })
    }

    async fn delete_issue(&self, id: &IssueId) -> Result<()> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM issues WHERE id = ?1", params![id.to_string()])?;
            if deleted == 0 {
                return Err(SprintboardError::IssueNotFound(id.to_string()));
            }
            Ok(())
        })
    }

    async fn list_issues_for_sprint(&self, sprint_id: &SprintId) -> Result<Vec<Issue>> {
        self.with_conn(|conn| {
            query_issues(
                conn,
                &format!(
                    "SELECT {} FROM issues WHERE sprint_id = ?1 ORDER BY {}",
                    ISSUE_COLUMNS, BOARD_ORDER
                ),
                params![sprint_id.to_string()],
            )
        })
    }

    async fn list_issues_for_project(&self, project_id: &ProjectId) -> Result<Vec<Issue>> {
        self.with_conn(|conn| {
            query_issues(
                conn,
                &format!("SELECT {} FROM issues WHERE project_id = ?1", ISSUE_COLUMNS),
                params![project_id.to_string()],
            )
        })
    }

    async fn find_issues_by_sprint_and_status(
        &self,
        sprint_id: &SprintId,
        status: IssueStatus,
    ) -> Result<Vec<Issue>> {
        self.with_conn(|conn| {
            query_issues(
                conn,
                &format!(
                    "SELECT {} FROM issues WHERE sprint_id = ?1 AND status = ?2 ORDER BY sort_order",
                    ISSUE_COLUMNS
                ),
                params![sprint_id.to_string(), status.as_str()],
            )
        })
    }

    async fn update_issue_orders(&self, updates: &[IssueOrderUpdate]) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let now = timestamp(&Utc::now());
            {
                let mut stmt = tx.prepare(
                    "UPDATE issues SET status = ?1, sort_order = ?2, priority = COALESCE(?3, priority),
                        updated_at = ?4
                     WHERE id = ?5",
                )?;
                for update in updates {
                    let changed = stmt.execute(params![
                        update.status.as_str(),
                        update.order,
                        update.priority.map(|p| p.as_str()),
                        now,
                        update.id.to_string(),
                    ])?;
                    if changed == 0 {
                        // Dropping the transaction rolls back every row written so far
                        return Err(SprintboardError::IssueNotFound(update.id.to_string()));
                    }
                }
            }
            tx.commit()?;
            tracing::debug!(rows = updates.len(), "issue order batch committed");
            Ok(())
        })
    }
}
