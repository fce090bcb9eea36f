use async_trait::async_trait;
use relmap_core::{
    CallbackPhase, ChangeTracker, Entity, EntityField, EntityMetadata, PropertyValue, Record,
    Sort, TemporalKind, Tracked, Value, Where,
};
use relmap_utils::time::{parse_date, parse_time, parse_timestamp};
use tracing::debug;

use super::{before_write, ensure_ready, entity_id, load, Persister};
use crate::{
    client::DatabaseClient,
    error::{DbError, Result},
    query::{
        AndChainFormulaBuilder, CountQueryBuilder, DeleteQueryBuilder, InsertQueryBuilder,
        SelectQueryBuilder, Statement, UpdateQueryBuilder,
    },
};

/// SQL persister: builds statements from metadata and runs them through an
/// injected [`DatabaseClient`].
#[derive(Debug)]
pub struct SqlPersister<C> {
    client: C,
    table_prefix: String,
}

impl<C: DatabaseClient> SqlPersister<C> {
    pub fn new(client: C, table_prefix: impl Into<String>) -> Self {
        Self {
            client,
            table_prefix: table_prefix.into(),
        }
    }

    /// Uses the table prefix of the process-wide configuration.
    pub fn from_config(client: C) -> Self {
        let table_prefix = relmap_config::get_config().table_prefix;
        Self::new(client, table_prefix)
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn table_prefix(&self) -> &str {
        &self.table_prefix
    }

    async fn query(&self, statement: Statement) -> Result<Vec<Record>> {
        debug!(statement = %statement, "query");
        self.client.query(&statement).await
    }

    async fn select(
        &self,
        metadata: &EntityMetadata,
        condition: Option<&Where>,
        sort: Option<&Sort>,
        limit: Option<u64>,
    ) -> Result<Vec<Record>> {
        let mut builder = SelectQueryBuilder::new(metadata);
        builder
            .set_table_prefix(self.table_prefix.as_str())
            .filter(condition)
            .order_by(sort);
        if let Some(limit) = limit {
            builder.limit(limit);
        }
        let rows = self.query(builder.build()?).await?;
        rows.into_iter().map(|row| decode_row(metadata, row)).collect()
    }

    fn id_condition(&self, metadata: &EntityMetadata, id: Value) -> AndChainFormulaBuilder {
        let column = metadata
            .id_field()
            .map(|field| field.column_name.as_str())
            .unwrap_or(metadata.id_property_name.as_str());
        let mut formula = AndChainFormulaBuilder::new();
        formula.append(
            &format!("{}{}", self.table_prefix, metadata.table_name),
            column,
            id,
        );
        formula
    }
}

/// Maps a row keyed by column to a record keyed by property. Temporal text is
/// parsed back to its kind; unknown columns are dropped.
fn decode_row(metadata: &EntityMetadata, row: Record) -> Result<Record> {
    let mut record = Record::new();
    for (column, value) in row {
        let Some(field) = metadata.field_by_column(&column) else {
            continue;
        };
        let value = match (metadata.temporal_kind(&field.property_name), value) {
            (Some(TemporalKind::Date), Value::Text(text)) => {
                Value::Date(parse_date(&text).map_err(relmap_core::CoreError::from)?)
            }
            (Some(TemporalKind::Time), Value::Text(text)) => {
                Value::Time(parse_time(&text).map_err(relmap_core::CoreError::from)?)
            }
            (Some(TemporalKind::Timestamp), Value::Text(text)) => {
                Value::Timestamp(parse_timestamp(&text).map_err(relmap_core::CoreError::from)?)
            }
            (_, value) => field.property_value(value),
        };
        record.insert(field.property_name.clone(), value);
    }
    Ok(record)
}

#[async_trait]
impl<C: DatabaseClient> Persister for SqlPersister<C> {
    async fn count(&self, metadata: &EntityMetadata, condition: Option<&Where>) -> Result<u64> {
        let mut builder = CountQueryBuilder::new(metadata);
        builder
            .set_table_prefix(self.table_prefix.as_str())
            .filter(condition);
        let rows = self.query(builder.build()?).await?;
        let count = rows
            .into_iter()
            .next()
            .and_then(|mut row| row.remove("count"))
            .ok_or_else(|| DbError::MissingCount {
                table: metadata.table_name.clone(),
            })?;
        Ok(u64::from_value(count)?)
    }

    async fn delete_all(
        &self,
        metadata: &EntityMetadata,
        condition: Option<&Where>,
    ) -> Result<u64> {
        let notify = metadata.has_callbacks(CallbackPhase::BeforeRemove)
            || metadata.has_callbacks(CallbackPhase::AfterRemove);

        let mut entities = Vec::new();
        if notify {
            for record in self.select(metadata, condition, None, None).await? {
                let mut entity = metadata.instantiate(&record)?;
                metadata.run_callbacks(CallbackPhase::BeforeRemove, entity.as_mut())?;
                entities.push(entity);
            }
        }

        let mut builder = DeleteQueryBuilder::new(metadata);
        builder
            .set_table_prefix(self.table_prefix.as_str())
            .filter(condition);
        let statement = builder.build()?;
        debug!(statement = %statement, "execute");
        let result = self.client.execute(&statement).await?;

        for entity in &mut entities {
            metadata.run_callbacks(CallbackPhase::AfterRemove, entity.as_mut())?;
        }
        Ok(result.affected_rows)
    }

    async fn find_all<E: Entity + Clone>(
        &self,
        metadata: &EntityMetadata,
        condition: Option<&Where>,
        sort: Option<&Sort>,
    ) -> Result<Vec<Tracked<E>>> {
        self.select(metadata, condition, sort, None)
            .await?
            .iter()
            .map(|record| load(metadata, record))
            .collect()
    }

    async fn find_by<E: Entity + Clone>(
        &self,
        metadata: &EntityMetadata,
        condition: Option<&Where>,
        sort: Option<&Sort>,
    ) -> Result<Option<Tracked<E>>> {
        self.select(metadata, condition, sort, Some(1))
            .await?
            .first()
            .map(|record| load(metadata, record))
            .transpose()
    }

    async fn insert<E: Entity + Clone>(
        &self,
        metadata: &EntityMetadata,
        mut entity: E,
    ) -> Result<Tracked<E>> {
        ensure_ready(metadata)?;
        before_write(metadata, &mut entity, true)?;

        let mut builder = InsertQueryBuilder::new();
        builder
            .set_table_prefix(self.table_prefix.as_str())
            .set_table_name(metadata.table_name.as_str())
            .append_entity(
                &entity,
                &metadata.fields,
                &metadata.temporal_properties,
                &[metadata.id_property_name.as_str()],
            );
        let statement = builder.build()?;
        debug!(statement = %statement, "execute");
        let result = self.client.execute(&statement).await?;

        if let Some(id) = result.last_insert_id {
            entity.set_property(&metadata.id_property_name, Value::Int(id))?;
        }
        metadata.run_callbacks(CallbackPhase::AfterInsert, &mut entity)?;
        Ok(Tracked::persisted(entity))
    }

    async fn update<E: Entity + Clone>(
        &self,
        metadata: &EntityMetadata,
        mut entity: Tracked<E>,
    ) -> Result<Tracked<E>> {
        ensure_ready(metadata)?;
        let id = entity_id(metadata, entity.entity())?;
        before_write(metadata, entity.entity_mut(), false)?;

        let changed: Vec<EntityField> = ChangeTracker::get_changed_fields(&entity, &metadata.fields)
            .into_iter()
            .cloned()
            .collect();
        let id_property = metadata.id_property_name.as_str();
        if changed.iter().all(|field| field.property_name == id_property) {
            debug!(table = %metadata.table_name, %id, "no changed fields, skipping update");
        } else {
            let mut builder = UpdateQueryBuilder::new();
            builder
                .set_table_prefix(self.table_prefix.as_str())
                .set_table_name(metadata.table_name.as_str());
            if ChangeTracker::get_last_entity_state(&entity).is_some() {
                builder.append_changes(
                    entity.entity(),
                    &changed,
                    &metadata.temporal_properties,
                    &[id_property],
                );
            } else {
                builder.append_entity(
                    entity.entity(),
                    &changed,
                    &metadata.temporal_properties,
                    &[id_property],
                );
            }
            builder.set_where_from_query_builder(&self.id_condition(metadata, id.clone()))?;
            let statement = builder.build()?;
            debug!(statement = %statement, "execute");
            let result = self.client.execute(&statement).await?;
            if result.affected_rows == 0 {
                return Err(DbError::NotFound {
                    table: metadata.table_name.clone(),
                    id,
                });
            }
        }

        metadata.run_callbacks(CallbackPhase::AfterUpdate, entity.entity_mut())?;
        ChangeTracker::save_last_entity_state(&mut entity);
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, sync::Mutex};

    use chrono::NaiveDate;
    use relmap_core::{impl_entity, metadata::default_factory};

    use super::*;
    use crate::{client::ExecuteResult, query::QueryArg};

    #[derive(Default)]
    struct RecordingClient {
        statements: Mutex<Vec<Statement>>,
        rows: Mutex<VecDeque<Vec<Record>>>,
        last_insert_id: Option<i64>,
        no_match: bool,
    }

    impl RecordingClient {
        fn with_rows(rows: Vec<Vec<Record>>) -> Self {
            Self {
                rows: Mutex::new(rows.into()),
                ..Self::default()
            }
        }

        fn templates(&self) -> Vec<String> {
            self.statements
                .lock()
                .unwrap()
                .iter()
                .map(|s| s.template.clone())
                .collect()
        }
    }

    #[async_trait]
    impl DatabaseClient for RecordingClient {
        async fn query(&self, statement: &Statement) -> Result<Vec<Record>> {
            self.statements.lock().unwrap().push(statement.clone());
            Ok(self.rows.lock().unwrap().pop_front().unwrap_or_default())
        }

        async fn execute(&self, statement: &Statement) -> Result<ExecuteResult> {
            self.statements.lock().unwrap().push(statement.clone());
            Ok(ExecuteResult {
                affected_rows: if self.no_match { 0 } else { 1 },
                last_insert_id: self.last_insert_id,
            })
        }
    }

    struct FailingClient;

    #[async_trait]
    impl DatabaseClient for FailingClient {
        async fn query(&self, _: &Statement) -> Result<Vec<Record>> {
            Err(DbError::client(std::io::Error::other("server has gone away")))
        }

        async fn execute(&self, _: &Statement) -> Result<ExecuteResult> {
            Err(DbError::client(std::io::Error::other("server has gone away")))
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Bar {
        id: Option<i64>,
        bar_name: String,
        opened_on: Option<NaiveDate>,
    }

    impl_entity!(Bar {
        id,
        bar_name => "barName",
        opened_on => "openedOn",
    });

    fn metadata() -> EntityMetadata {
        let mut metadata = EntityMetadata::new("bar");
        metadata.factory = Some(default_factory::<Bar>());
        metadata.set_id_property("id").unwrap();
        metadata
            .add_field(EntityField::new("id", "id").updatable(false))
            .unwrap();
        metadata
            .add_field(EntityField::new("barName", "bar_name"))
            .unwrap();
        metadata
            .add_field(EntityField::new("openedOn", "opened_on"))
            .unwrap();
        metadata
            .add_temporal("openedOn", TemporalKind::Date)
            .unwrap();
        metadata
    }

    fn row(id: i64, name: &str, opened_on: &str) -> Record {
        Record::new()
            .with("id", id)
            .with("bar_name", name)
            .with("opened_on", opened_on)
    }

    #[tokio::test]
    async fn test_insert_sets_generated_id() {
        let client = RecordingClient {
            last_insert_id: Some(12),
            ..RecordingClient::default()
        };
        let persister = SqlPersister::new(client, "app_");
        let bar = Bar {
            bar_name: "Bar 123".to_string(),
            opened_on: NaiveDate::from_ymd_opt(2021, 6, 1),
            ..Bar::default()
        };

        let inserted = persister.insert(&metadata(), bar).await.unwrap();
        assert_eq!(inserted.id, Some(12));

        let statements = persister.client().statements.lock().unwrap();
        assert_eq!(
            statements[0].template,
            "INSERT INTO ?? (??, ??) VALUES (?, ?)"
        );
        assert_eq!(
            statements[0].args[0],
            QueryArg::identifier("app_bar")
        );
        assert_eq!(
            statements[0].args[4],
            QueryArg::value("2021-06-01")
        );
    }

    #[tokio::test]
    async fn test_find_all_decodes_rows() {
        let client = RecordingClient::with_rows(vec![vec![
            row(1, "Bar 123", "2021-06-01"),
            row(2, "Bar 456", "2022-01-15"),
        ]]);
        let persister = SqlPersister::new(client, "");
        let bars: Vec<Tracked<Bar>> = persister
            .find_all(&metadata(), None, None)
            .await
            .unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].bar_name, "Bar 456");
        assert_eq!(bars[1].opened_on, NaiveDate::from_ymd_opt(2022, 1, 15));
        assert_eq!(
            persister.client().templates(),
            vec!["SELECT ??, ??, ?? FROM ??"]
        );
    }

    #[tokio::test]
    async fn test_find_by_uses_limit() {
        let client = RecordingClient::with_rows(vec![vec![row(2, "Bar 456", "2022-01-15")]]);
        let persister = SqlPersister::new(client, "");
        let condition = Where::property_equals("barName", "Bar 456");
        let found: Option<Tracked<Bar>> = persister
            .find_by(&metadata(), Some(&condition), None)
            .await
            .unwrap();

        assert_eq!(found.unwrap().id, Some(2));
        assert_eq!(
            persister.client().templates(),
            vec!["SELECT ??, ??, ?? FROM ?? WHERE ?? = ? LIMIT 1"]
        );
    }

    #[tokio::test]
    async fn test_update_writes_only_changed_fields() {
        let client = RecordingClient::with_rows(vec![vec![row(2, "Bar 456", "2022-01-15")]]);
        let persister = SqlPersister::new(client, "");
        let metadata = metadata();
        let mut bar: Tracked<Bar> = persister
            .find_by(&metadata, None, None)
            .await
            .unwrap()
            .unwrap();

        let bar_unchanged = persister.update(&metadata, bar.clone()).await.unwrap();
        assert_eq!(persister.client().templates().len(), 1);

        bar.bar_name = "Bar 457".to_string();
        persister.update(&metadata, bar).await.unwrap();

        let statements = persister.client().statements.lock().unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[1].template,
            "UPDATE ?? SET ?? = ? WHERE (?? = ?)"
        );
        assert_eq!(
            statements[1].args,
            vec![
                QueryArg::identifier("bar"),
                QueryArg::identifier("bar_name"),
                QueryArg::value("Bar 457"),
                QueryArg::identifier("bar.id"),
                QueryArg::value(2),
            ]
        );
        assert_eq!(bar_unchanged.bar_name, "Bar 456");
    }

    #[tokio::test]
    async fn test_update_writes_null_for_cleared_field() {
        let client = RecordingClient::with_rows(vec![
            vec![row(2, "Bar 456", "2022-01-15")],
            vec![row(2, "Bar 456", "2022-01-15")],
        ]);
        let persister = SqlPersister::new(client, "");
        let metadata = metadata();

        let mut bar: Tracked<Bar> = persister
            .find_by(&metadata, None, None)
            .await
            .unwrap()
            .unwrap();
        bar.opened_on = None;
        let updated = persister.update(&metadata, bar).await.unwrap();
        assert!(ChangeTracker::get_changed_fields(&updated, &metadata.fields).is_empty());

        let mut bar: Tracked<Bar> = persister
            .find_by(&metadata, None, None)
            .await
            .unwrap()
            .unwrap();
        bar.bar_name = "Bar 457".to_string();
        bar.opened_on = None;
        persister.update(&metadata, bar).await.unwrap();

        let statements = persister.client().statements.lock().unwrap();
        assert_eq!(
            statements[1].template,
            "UPDATE ?? SET ?? = NULL WHERE (?? = ?)"
        );
        assert_eq!(statements[1].args[1], QueryArg::identifier("opened_on"));
        assert_eq!(
            statements[3].template,
            "UPDATE ?? SET ?? = ?, ?? = NULL WHERE (?? = ?)"
        );
        assert_eq!(statements[3].args[3], QueryArg::identifier("opened_on"));
    }

    #[tokio::test]
    async fn test_update_of_missing_row_fails() {
        let client = RecordingClient {
            no_match: true,
            ..RecordingClient::default()
        };
        let persister = SqlPersister::new(client, "");
        let bar = Bar {
            id: Some(99),
            bar_name: "Bar 99".to_string(),
            opened_on: None,
        };
        let err = persister
            .update(&metadata(), Tracked::new(bar))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::NotFound { ref table, id: Value::Int(99) } if table == "bar"
        ));
    }

    #[tokio::test]
    async fn test_update_without_snapshot_writes_all_updatable() {
        let persister = SqlPersister::new(RecordingClient::default(), "");
        let bar = Bar {
            id: Some(5),
            bar_name: "Bar 5".to_string(),
            opened_on: NaiveDate::from_ymd_opt(2020, 2, 2),
        };
        persister
            .update(&metadata(), Tracked::new(bar))
            .await
            .unwrap();
        assert_eq!(
            persister.client().templates(),
            vec!["UPDATE ?? SET ?? = ?, ?? = ? WHERE (?? = ?)"]
        );
    }

    #[tokio::test]
    async fn test_count_reads_count_column() {
        let client = RecordingClient::with_rows(vec![
            vec![Record::new().with("count", 3)],
            vec![Record::new().with("count", 0)],
        ]);
        let persister = SqlPersister::new(client, "");
        assert_eq!(persister.count(&metadata(), None).await.unwrap(), 3);
        assert!(!persister.exists_by(&metadata(), None).await.unwrap());
    }

    #[tokio::test]
    async fn test_count_decodes_or_rejects_count_column() {
        let client = RecordingClient::with_rows(vec![
            vec![Record::new().with("count", "4")],
            vec![Record::new().with("total", 4)],
            vec![Record::new().with("count", "many")],
        ]);
        let persister = SqlPersister::new(client, "");
        assert_eq!(persister.count(&metadata(), None).await.unwrap(), 4);
        assert!(matches!(
            persister.count(&metadata(), None).await,
            Err(DbError::MissingCount { .. })
        ));
        assert!(matches!(
            persister.count(&metadata(), None).await,
            Err(DbError::Core(_))
        ));
    }

    #[tokio::test]
    async fn test_client_errors_propagate() {
        let persister = SqlPersister::new(FailingClient, "");
        let err = persister.count(&metadata(), None).await.unwrap_err();
        assert!(matches!(err, DbError::Client(_)));
        assert_eq!(err.to_string(), "server has gone away");
    }

    #[test]
    #[serial_test::serial]
    fn test_prefix_from_config() {
        let persister = SqlPersister::from_config(FailingClient);
        assert_eq!(
            persister.table_prefix(),
            relmap_config::get_config().table_prefix
        );
    }
}
