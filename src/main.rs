extern crate chrono;
extern crate serde_json;
extern crate log;
extern crate log4rs;
extern crate ctrlc;
extern crate clap;

use std::path::{Path, PathBuf};
use std::process::exit;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use clap::{App, ArgMatches};

mod aggregate;
mod chart;
mod config;
mod error;
mod export;
mod local;
mod query;
mod record;
mod refresh;
mod remote;
mod store;
mod view;

use crate::config::Configuration;
use crate::error::{CommandError, ExportError, StoreError, ValidationError};
use crate::export::ExportFormat;
use crate::query::FilterSpec;
use crate::record::{RecordForm, RecordId};
use crate::store::{RecordStore, Served};
use crate::view::{EditDraft, ViewSynchronizer};

fn main() {
    let cli_yaml = clap::load_yaml!("cli.yml");
    let matches = App::from(cli_yaml).get_matches();

    let log_config = matches.value_of("log-config").unwrap_or(config::DEFAULT_LOG_CONFIG_PATH);
    match log4rs::init_file(log_config, Default::default()) {
        Ok(_) => {},
        Err(err) => {
            eprintln!("Could not create logger from yaml configuration '{}': {}", log_config, err);
            exit(-100);
        }
    };

    let config_path = matches.value_of("config").unwrap_or(config::DEFAULT_CONFIG_PATH);
    let configuration = match Configuration::from_file(config_path) {
        Ok(configuration) => configuration,
        Err(err) => {
            log::error!(target: "redlined", "Cannot load the configuration '{}': '{}'", config_path, err);
            exit(101);
        }
    };

    let mut store = match RecordStore::from_parameters(&configuration.storage) {
        Ok(store) => store,
        Err(err) => {
            log::error!(target: "redlined", "Cannot open the record store: '{}'", err);
            exit(102);
        }
    };

    let result = match matches.subcommand() {
        ("add", Some(sub)) => run_add(&mut store, sub),
        ("list", Some(sub)) => run_list(&mut store, sub),
        ("edit", Some(sub)) => run_edit(&mut store, sub),
        ("delete", Some(sub)) => run_delete(&mut store, sub),
        ("export", Some(sub)) => run_export(&mut store, sub, &configuration),
        ("dashboard", Some(sub)) => run_dashboard(&mut store, sub, &configuration),
        ("watch", Some(sub)) => run_watch(store, sub, &configuration),
        (name, _) => Err(CommandError::Usage(format!("unknown command '{}'", name))),
    };

    match result {
        Ok(()) => {},
        Err(CommandError::Export(ExportError::Unavailable(reason))) => {
            log::info!(target: "redlined", "Export not produced: {}", reason);
            println!("{}", reason);
        }
        Err(CommandError::Validation(err)) => {
            log::error!(target: "redlined", "Entry not saved: '{}'", err);
            exit(2);
        }
        Err(CommandError::Usage(message)) => {
            log::error!(target: "redlined", "{}", message);
            exit(64);
        }
        Err(err) => {
            log::error!(target: "redlined", "Command failed: '{}'", err);
            exit(1);
        }
    };

    log::debug!(target: "redlined", "Exiting");
    exit(0);
}

/// Parses the optional argument `name`, reporting unparsable input as invalid `field`.
fn parse_arg<T: FromStr>(matches: &ArgMatches, name: &'static str) -> Result<Option<T>, ValidationError> {
    match matches.value_of(name) {
        None => Ok(None),
        Some(text) => text.parse::<T>().map(Some).map_err(|_| ValidationError::Invalid {
            field: name,
            value: text.to_string(),
        }),
    }
}

fn filter_from_matches(matches: &ArgMatches) -> Result<FilterSpec, ValidationError> {
    let mut spec = FilterSpec::default();
    if let Some(year) = parse_arg::<i32>(matches, "year")? {
        spec = spec.with_year(year);
    }
    let (year_from, year_to) = (parse_arg(matches, "year-from")?, parse_arg(matches, "year-to")?);
    if year_from.is_some() || year_to.is_some() {
        spec = spec.with_years(year_from, year_to);
    }
    if let Some(month) = parse_arg(matches, "month")? {
        spec = spec.with_month(month);
    }
    let (month_from, month_to) = (parse_arg(matches, "month-from")?, parse_arg(matches, "month-to")?);
    if month_from.is_some() || month_to.is_some() {
        spec = spec.with_months(month_from, month_to);
    }
    if let Some(line) = parse_arg(matches, "line")? {
        spec = spec.with_line(line);
    }
    if let Some(measurement_type) = parse_arg(matches, "type")? {
        spec = spec.with_type(measurement_type);
    }
    Ok(spec)
}

/// Unwraps a store result, telling the user when the local fallback served it.
fn served<T>(served: Served<T>) -> T {
    if let Some(diagnostic) = &served.diagnostic {
        eprintln!("warning: {}", diagnostic);
    }
    served.value
}

/// Loads the records matching the filter of `matches` into a view, in display order.
fn load_view(store: &mut RecordStore, matches: &ArgMatches) -> Result<ViewSynchronizer, CommandError> {
    let filter = filter_from_matches(matches)?;
    let records = served(store.list(&filter)?);
    let mut view = ViewSynchronizer::new(records);
    view.apply_filter(filter);
    Ok(view)
}

fn run_add(store: &mut RecordStore, matches: &ArgMatches) -> Result<(), CommandError> {
    let text = |name: &str| matches.value_of(name).unwrap_or("").to_string();
    let form = RecordForm {
        year: text("year"),
        month: text("month"),
        line: text("line"),
        measurement_type: text("type"),
        value: text("value"),
        note: text("note"),
    };
    let record = form.validate(RecordId::new())?;
    served(store.create(&record)?);
    log::info!(target: "redlined", "Added record {}", record.id);
    println!("บันทึกข้อมูลเรียบร้อย ({})", record.id);
    Ok(())
}

fn run_list(store: &mut RecordStore, matches: &ArgMatches) -> Result<(), CommandError> {
    let view = load_view(store, matches)?;
    print!("{}", view.render_table());
    Ok(())
}

/// Finds the edit target by `--id` or by its position in the filtered list.
fn open_draft(store: &mut RecordStore, matches: &ArgMatches) -> Result<EditDraft, CommandError> {
    let view = load_view(store, matches)?;
    if let Some(id) = parse_arg::<RecordId>(matches, "id")? {
        let record = view
            .rows()
            .iter()
            .find(|record| record.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("no record with id {}", id)))?;
        return Ok(EditDraft {
            id,
            form: RecordForm::from_record(record),
        });
    }
    let position = parse_arg::<usize>(matches, "POSITION")?.ok_or(ValidationError::Missing("position"))?;
    Ok(view.begin_edit(position)?)
}

fn run_edit(store: &mut RecordStore, matches: &ArgMatches) -> Result<(), CommandError> {
    let mut draft = open_draft(store, matches)?;
    let mut changes: [(&str, &mut String); 6] = [
        ("set-year", &mut draft.form.year),
        ("set-month", &mut draft.form.month),
        ("set-line", &mut draft.form.line),
        ("set-type", &mut draft.form.measurement_type),
        ("set-value", &mut draft.form.value),
        ("set-note", &mut draft.form.note),
    ];
    let mut changed = false;
    for (name, field) in changes.iter_mut() {
        if let Some(value) = matches.value_of(*name) {
            **field = value.to_string();
            changed = true;
        }
    }
    if !changed {
        return Err(CommandError::Usage(String::from("nothing to change, pass at least one --set-* option")));
    }

    let record = draft.finish()?;
    served(store.update(draft.id, &record)?);
    log::info!(target: "redlined", "Updated record {}", draft.id);
    println!("แก้ไขข้อมูลเรียบร้อย ({})", draft.id);
    Ok(())
}

fn run_delete(store: &mut RecordStore, matches: &ArgMatches) -> Result<(), CommandError> {
    let id = match parse_arg::<RecordId>(matches, "id")? {
        Some(id) => id,
        None => {
            let view = load_view(store, matches)?;
            let position = parse_arg::<usize>(matches, "POSITION")?.ok_or(ValidationError::Missing("position"))?;
            view.resolve(position)?
        }
    };
    served(store.delete(id)?);
    log::info!(target: "redlined", "Deleted record {}", id);
    println!("ลบข้อมูลเรียบร้อย ({})", id);
    Ok(())
}

fn run_export(store: &mut RecordStore, matches: &ArgMatches, configuration: &Configuration) -> Result<(), CommandError> {
    let format = parse_arg::<ExportFormat>(matches, "format")?.unwrap_or(ExportFormat::Xlsx);
    let view = load_view(store, matches)?;
    let path = export::export(view.rows(), format, matches.value_of("output").map(Path::new), &configuration.export)?;
    println!("{}", path.display());
    Ok(())
}

fn run_dashboard(store: &mut RecordStore, matches: &ArgMatches, configuration: &Configuration) -> Result<(), CommandError> {
    let view = load_view(store, matches)?;
    let dashboard = view.dashboard();

    println!("{} รายการ, ค่าเฉลี่ย {}", dashboard.summary.count, dashboard.average_label());
    for (measurement_type, count) in &dashboard.type_counts {
        println!("  {:<6} {}", measurement_type.as_str(), count);
    }
    for (line, count) in &dashboard.line_counts {
        println!("  {:<10} {}", line.label(), count);
    }
    for bucket in &dashboard.periods {
        println!("  {:<20} {:>10} ({})", bucket.label(), bucket.total, bucket.count);
    }

    let out_dir = match matches.value_of("out") {
        Some(dir) => PathBuf::from(dir),
        None => configuration.export.output_dir.join("charts"),
    };
    for path in chart::render_dashboard(dashboard, &out_dir)? {
        println!("{}", path.display());
    }
    Ok(())
}

fn run_watch(mut store: RecordStore, matches: &ArgMatches, configuration: &Configuration) -> Result<(), CommandError> {
    let view = load_view(&mut store, matches)?;
    print!("{}", view.render_table());
    if !store.remote_active() {
        println!("Remote storage not in use, nothing to watch");
        return Ok(());
    }

    let view = Arc::new(Mutex::new(view));
    let terminate_programm = Arc::new(AtomicBool::new(false));
    let terminate_refresh_thread = Arc::clone(&terminate_programm);
    let refresh_view = Arc::clone(&view);
    let refresh_configuration = configuration.refresh.clone();

    ctrlc::set_handler(move || {
        log::info!(target: "redlined", "Termination signal received!");
        terminate_programm.store(true, Ordering::SeqCst);
    })?;

    let refresh_thread = match thread::Builder::new()
        .name("refresh".to_string())
        .spawn(move || {
            refresh::refresh_thread(store, refresh_view, terminate_refresh_thread, refresh_configuration, |view| {
                print!("{}", view.render_table());
            });
        }) {
        Ok(handle) => handle,
        Err(err) => {
            log::error!(target: "redlined", "Cannot start the refresh thread: '{}'", err);
            exit(201);
        }
    };

    match refresh_thread.join() {
        Ok(_) => log::debug!(target: "redlined", "Joined refresh thread!"),
        Err(_) => {
            log::error!(target: "redlined", "Could not join the refresh thread!");
            exit(301);
        }
    };
    Ok(())
}
