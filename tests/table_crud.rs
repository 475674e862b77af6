use anyhow::Result;
use rust_dal::{
    DalError, Date, FieldType, Predicate, Row, Schema, SqliteManager, TableSchema, Value,
};
use tempfile::TempDir;

fn users_schema() -> Schema {
    Schema::new().add_table(
        TableSchema::new("users")
            .with_field("id", FieldType::Int, "PRIMARY KEY")
            .with_field("name", FieldType::Text, "")
            .with_field("pwd", FieldType::Pwd, ""),
    )
}

fn ledger_schema() -> Schema {
    Schema::new().add_table(
        TableSchema::new("ledger")
            .with_field("id", FieldType::Int, "PRIMARY KEY")
            .with_field("booked", FieldType::Date, "")
            .with_field("amount", FieldType::Money, "")
            .with_field("cleared", FieldType::Bit, "")
            .with_field("rate", FieldType::Real, "")
            .with_field("memo", FieldType::Text, ""),
    )
}

// Helper function to create a manager over a fresh temporary database file
fn create_temp_db(schema: Schema) -> Result<(SqliteManager, TempDir)> {
    let dir = tempfile::tempdir()?;
    let manager = SqliteManager::open_with(dir.path().join("test.db"), schema)?;
    Ok((manager, dir))
}

fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn test_add_then_get_user_with_password() -> Result<()> {
    let (db, _dir) = create_temp_db(users_schema())?;
    let users = db.table("users")?;

    let id = users.add(&row(&[("name", "alice".into()), ("pwd", "s3cret".into())]))?;

    let rows = users.get(["name", "pwd"], &Predicate::new("id = ?").with_param(id))?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], Value::Text("alice".to_string()));

    let credential = rows[0]["pwd"]
        .as_credential()
        .expect("pwd reads back as a credential");
    assert!(credential.verify("s3cret"));
    assert!(!credential.verify("wrong"));
    Ok(())
}

#[test]
fn test_get_accepts_map_keys_and_ignores_values() -> Result<()> {
    let (db, _dir) = create_temp_db(users_schema())?;
    let users = db.table("users")?;
    let id = users.add(&row(&[("name", "carol".into())]))?;

    let wanted = row(&[("name", Value::Null), ("id", Value::Integer(-1))]);
    let rows = users.get(wanted.keys(), &Predicate::new("id = ?").with_param(id))?;

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].len(), 2);
    assert_eq!(rows[0]["id"], Value::Integer(id));
    assert_eq!(rows[0]["name"], Value::from("carol"));
    Ok(())
}

#[test]
fn test_empty_result_is_empty_vec() -> Result<()> {
    let (db, _dir) = create_temp_db(users_schema())?;
    let users = db.table("users")?;
    users.add(&row(&[("name", "alice".into())]))?;

    let rows = users.get(["name"], &Predicate::new("name = ?").with_param("nobody"))?;
    assert!(rows.is_empty());
    Ok(())
}

#[test]
fn test_partial_update_leaves_other_fields() -> Result<()> {
    let (db, _dir) = create_temp_db(users_schema())?;
    let users = db.table("users")?;
    let id = users.add(&row(&[("name", "alice".into()), ("pwd", "s3cret".into())]))?;
    let by_id = Predicate::new("id = ?").with_param(id);

    let before = users.get(["pwd"], &by_id)?;
    let changed = users.update(&row(&[("name", "bob".into())]), &by_id)?;
    assert_eq!(changed, 1);

    let after = users.get(["name", "pwd"], &by_id)?;
    assert_eq!(after[0]["name"], Value::from("bob"));
    assert_eq!(after[0]["pwd"], before[0]["pwd"]);
    Ok(())
}

#[test]
fn test_update_binds_predicate_params_after_set_params() -> Result<()> {
    let (db, _dir) = create_temp_db(users_schema())?;
    let users = db.table("users")?;
    users.add(&row(&[("id", 1.into()), ("name", "alice".into())]))?;
    users.add(&row(&[("id", 2.into()), ("name", "bob".into())]))?;

    let changed = users.update(
        &row(&[("name", "renamed".into())]),
        &Predicate::new("id = ? AND name = ?").with_params([Value::from(2), Value::from("bob")]),
    )?;
    assert_eq!(changed, 1);

    let rows = users.get(["id"], &Predicate::new("name = ?").with_param("renamed"))?;
    assert_eq!(rows, vec![row(&[("id", Value::Integer(2))])]);
    Ok(())
}

#[test]
fn test_undeclared_keys_are_ignored() -> Result<()> {
    let (db, _dir) = create_temp_db(users_schema())?;
    let users = db.table("users")?;

    let id = users.add(&row(&[("name", "dave".into()), ("nickname", "d".into())]))?;
    let rows = users.get(["name", "nickname"], &Predicate::new("id = ?").with_param(id))?;
    assert_eq!(rows, vec![row(&[("name", Value::from("dave"))])]);
    Ok(())
}

#[test]
fn test_empty_field_set_is_rejected() -> Result<()> {
    let (db, _dir) = create_temp_db(users_schema())?;
    let users = db.table("users")?;
    let all = Predicate::new("1 = 1");

    assert!(matches!(users.add(&Row::new()), Err(DalError::Validation(_))));
    assert!(matches!(
        users.add(&row(&[("unknown", 1.into())])),
        Err(DalError::Validation(_))
    ));
    assert!(matches!(users.update(&Row::new(), &all), Err(DalError::Validation(_))));
    assert!(matches!(
        users.get(Vec::<String>::new(), &all),
        Err(DalError::Validation(_))
    ));
    assert!(matches!(
        users.get(["name"], &Predicate::new("  ")),
        Err(DalError::Validation(_))
    ));
    Ok(())
}

#[test]
fn test_statement_errors_are_surfaced() -> Result<()> {
    let (db, _dir) = create_temp_db(users_schema())?;
    let users = db.table("users")?;
    users.add(&row(&[("id", 7.into()), ("name", "alice".into())]))?;

    // Primary key violation.
    let err = users
        .add(&row(&[("id", 7.into()), ("name", "again".into())]))
        .unwrap_err();
    assert!(matches!(err, DalError::Statement { .. }));

    // Malformed fragment.
    let err = users.get(["name"], &Predicate::new("id = = ?")).unwrap_err();
    assert!(matches!(err, DalError::Statement { .. }));

    // The failed insert did not partially apply.
    let rows = users.get(["name"], &Predicate::new("id = ?").with_param(7))?;
    assert_eq!(rows, vec![row(&[("name", Value::from("alice"))])]);
    Ok(())
}

#[test]
fn test_conversion_errors_are_surfaced() -> Result<()> {
    let (db, _dir) = create_temp_db(users_schema())?;
    let users = db.table("users")?;

    let err = users.add(&row(&[("name", 42.into())])).unwrap_err();
    assert!(matches!(
        err,
        DalError::Conversion {
            field_type: FieldType::Text,
            ..
        }
    ));
    Ok(())
}

#[test]
fn test_typed_fields_round_trip_through_the_database() -> Result<()> {
    let (db, _dir) = create_temp_db(ledger_schema())?;
    let ledger = db.table("ledger")?;

    let id = ledger.add(&row(&[
        ("booked", Date::new(2023, 1, 5).into()),
        ("amount", 12.34.into()),
        ("cleared", true.into()),
        ("rate", 0.25.into()),
        ("memo", "coffee".into()),
    ]))?;

    let rows = ledger.get(ledger.field_names(), &Predicate::new("id = ?").with_param(id))?;
    assert_eq!(rows.len(), 1);
    let r = &rows[0];
    assert_eq!(r["id"], Value::Integer(id));
    assert_eq!(r["booked"], Value::Date(Date::new(2023, 1, 5)));
    assert_eq!(r["amount"], Value::Real(12.34));
    assert_eq!(r["cleared"], Value::Boolean(true));
    assert_eq!(r["rate"], Value::Real(0.25));
    assert_eq!(r["memo"], Value::from("coffee"));
    Ok(())
}

#[test]
fn test_omitted_fields_read_back_as_null() -> Result<()> {
    let (db, _dir) = create_temp_db(ledger_schema())?;
    let ledger = db.table("ledger")?;

    let id = ledger.add(&row(&[("memo", "pending".into())]))?;
    let rows = ledger.get(["booked", "amount", "cleared"], &Predicate::new("id = ?").with_param(id))?;
    assert_eq!(
        rows,
        vec![row(&[
            ("booked", Value::Null),
            ("amount", Value::Null),
            ("cleared", Value::Null),
        ])]
    );
    Ok(())
}

#[test]
fn test_date_predicate_params_bind_in_storage_form() -> Result<()> {
    let (db, _dir) = create_temp_db(ledger_schema())?;
    let ledger = db.table("ledger")?;
    for (day, memo) in [(3u8, "early"), (5, "mid"), (9, "late")] {
        ledger.add(&row(&[
            ("booked", Date::new(2023, 1, day).into()),
            ("memo", memo.into()),
        ]))?;
    }

    let rows = ledger.get(
        ["memo"],
        &Predicate::new("booked >= ? AND booked < ?")
            .with_params([Date::new(2023, 1, 4), Date::new(2023, 1, 9)]),
    )?;
    assert_eq!(rows, vec![row(&[("memo", Value::from("mid"))])]);
    Ok(())
}
