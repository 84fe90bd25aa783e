use chrono::NaiveDate;
use secrecy::ExposeSecret;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::capabilities::{Capabilities, HttpRequest};
use crate::config::ClientConfig;
use crate::event::Event;
use crate::model::{FieldView, FormState, FormView, ListState, ListView, Model, ResultModal, ViewModel};
use crate::resources::Resource;
use crate::screens::FormKind;
use crate::submission::{SubmissionError, SubmissionPipeline};
use crate::validation::FieldValue;
use crate::{AppError, AppResult, ErrorKind};

pub struct App {
    caps: Capabilities,
    config: ClientConfig,
    pipeline: SubmissionPipeline,
    today: Option<NaiveDate>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl App {
    pub fn new(caps: Capabilities, config: ClientConfig) -> Self {
        let pipeline = SubmissionPipeline::new(&caps, config.clone());
        Self {
            caps,
            config,
            pipeline,
            today: None,
        }
    }

    /// Pin the date used by age and publication rules.
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    pub fn pipeline(&self) -> &SubmissionPipeline {
        &self.pipeline
    }

    #[instrument(skip(self, event, model), fields(event = event.name()))]
    pub async fn update(&self, event: Event, model: &mut Model) {
        match event {
            Event::OpenForm { kind, params } => self.open_form(kind, params.as_ref(), model),
            Event::FormFocused => self.load_pickers(model).await,
            Event::FieldChanged { field, value } => {
                self.set_field(model, field, FieldValue::Text(value));
            }
            Event::FieldBlurred { field } => {
                if let Some(form) = model.form.as_mut() {
                    form.touched.insert(field);
                }
            }
            Event::PickerSelected { field, selection } => {
                self.set_field(model, field, FieldValue::Choice(selection));
            }
            Event::DateSelected { field, date } => {
                self.set_field(model, field, FieldValue::Date(date));
            }
            Event::AssetPicked(asset) => {
                if let Some(form) = model.form.as_mut() {
                    form.asset = Some(asset);
                }
            }
            Event::AssetPickCancelled => debug!("asset pick cancelled"),
            Event::SubmitPressed => self.submit(model).await,
            Event::ModalDismissed => model.modal = None,
            Event::ListFocused { kind } => {
                let mut list = match model.list.take() {
                    Some(existing) if existing.kind == kind => existing,
                    _ => ListState::new(kind),
                };
                list.search_text.clear();
                self.refresh_list(&mut list).await;
                model.list = Some(list);
            }
            Event::SearchChanged { text } => {
                if let Some(list) = model.list.as_mut() {
                    list.search_text = text;
                }
            }
            Event::SearchSubmitted => {
                if let Some(list) = model.list.as_ref() {
                    self.caps
                        .navigator
                        .navigate(list.kind.search_request(&list.search_text));
                }
            }
            Event::ItemSelected { index } => {
                let Some(list) = model.list.as_ref() else {
                    return;
                };
                match list.items.get(index) {
                    Some(item) => self.caps.navigator.navigate(list.kind.item_request(item.clone())),
                    None => warn!(index, len = list.items.len(), "selected item out of range"),
                }
            }
        }
    }

    pub fn view(&self, model: &Model) -> ViewModel {
        let today = self.today();
        let loading = self.pipeline.is_in_flight();

        let form = model.form.as_ref().map(|form| FormView {
            screen: form.kind.screen_name().to_string(),
            fields: form
                .values
                .iter()
                .map(|(name, value)| FieldView {
                    name: name.to_string(),
                    value: value.clone(),
                    error: form.visible_error(name).map(str::to_string),
                })
                .collect(),
            asset: form.asset.clone(),
            pickers: form.pickers.clone(),
            can_submit: !loading
                && form.extra.is_some()
                && form.kind.schema().validate(&form.values, today).is_empty(),
        });

        let list = model.list.as_ref().map(|list| ListView {
            placeholder: list.kind.placeholder().to_string(),
            search_text: list.search_text.clone(),
            items: list.items.clone(),
            error: list.error.clone(),
        });

        ViewModel {
            form,
            list,
            modal: model.modal.clone(),
            loading,
        }
    }

    // ========================================================================
    // Forms
    // ========================================================================

    fn open_form(&self, kind: FormKind, params: Option<&Value>, model: &mut Model) {
        let record = kind
            .route_record_key()
            .and_then(|key| params.and_then(|p| p.get(key)));

        let extra = kind.extra_values(record);
        if extra.is_none() {
            warn!(form = kind.screen_name(), "route params lack fields this form sends");
        }

        model.form = Some(FormState::new(
            kind,
            kind.initial_values(self.today(), record),
            extra,
        ));
        model.modal = None;
    }

    fn set_field(&self, model: &mut Model, field: String, value: FieldValue) {
        let Some(form) = model.form.as_mut() else {
            return;
        };
        form.values.set(field.clone(), value);
        form.touched.insert(field);
        form.errors = form.kind.schema().validate(&form.values, self.today());
    }

    async fn load_pickers(&self, model: &mut Model) {
        let Some(kind) = model.form.as_ref().map(|f| f.kind) else {
            return;
        };

        for source in kind.picker_sources() {
            let options = match self.fetch(&source.resource()).await {
                Ok(body) => match source.parse_options(&body) {
                    Ok(options) => options,
                    Err(e) => {
                        warn!(field = source.field(), error = %e, "unexpected picker payload");
                        continue;
                    }
                },
                Err(e) => {
                    warn!(field = source.field(), error = %e, "failed to load picker options");
                    continue;
                }
            };

            if let Some(form) = model.form.as_mut() {
                form.pickers.insert(source.field().to_string(), options);
                form.apply_picker_defaults();
            }
        }
    }

    async fn submit(&self, model: &mut Model) {
        let today = self.today();
        let Some(form) = model.form.as_mut() else {
            warn!("submit pressed without an open form");
            return;
        };

        let schema = form.kind.schema();
        form.touched
            .extend(schema.fields().map(|(name, _)| name.to_string()));
        form.errors = schema.validate(&form.values, today);
        if !form.errors.is_empty() {
            info!(invalid_fields = form.errors.len(), "submit blocked by validation");
            return;
        }

        let kind = form.kind;
        let Some(extra) = form.extra.clone() else {
            error!(form = kind.screen_name(), "cannot submit without route fields");
            let err = AppError::new(ErrorKind::InvalidState, "missing route fields");
            model.modal = Some(ResultModal::failure(err.user_facing_message()));
            return;
        };

        let payload = kind.payload_values(&form.values, &extra);
        let asset = form.asset.take();
        if kind.resets_on_submit() {
            form.reset();
        }

        let result = self
            .pipeline
            .submit(&kind.submission_target(), &payload, asset.as_ref())
            .await;

        match result {
            Ok(_) => {
                if let Some(request) = kind.on_success() {
                    self.caps.navigator.navigate(request);
                }
                model.modal = Some(ResultModal::success());
            }
            Err(SubmissionError::InFlight) => debug!("ignoring submit while one is in flight"),
            Err(err) => {
                let app_error = AppError::from(err);
                model.modal = Some(ResultModal::failure(app_error.user_facing_message()));
            }
        }
    }

    // ========================================================================
    // Lists
    // ========================================================================

    async fn refresh_list(&self, list: &mut ListState) {
        match self.fetch(&list.kind.resource()).await {
            Ok(Value::Array(items)) => {
                info!(count = items.len(), "list loaded");
                list.items = items;
                list.error = None;
            }
            Ok(_) => {
                warn!("list endpoint did not return an array");
                list.error = Some(
                    AppError::new(ErrorKind::Server, "unexpected list payload").user_facing_message(),
                );
            }
            Err(e) => {
                error!(error = %e, "failed to load list");
                list.error = Some(e.user_facing_message());
            }
        }
    }

    /// Authorized GET of a collection.
    async fn fetch(&self, resource: &Resource) -> AppResult<Value> {
        let token = self.caps.tokens.retrieve().await.map_err(|e| {
            AppError::new(ErrorKind::AuthMissing, "access token unavailable").with_internal(e.to_string())
        })?;

        let mut request = HttpRequest::get(self.config.endpoint(&resource.path())?)
            .with_header("Accept", "application/json")?
            .with_bearer(token.expose_secret())?
            .with_timeout(Duration::from_millis(self.config.timeout_ms))?;
        for (name, value) in resource.query() {
            request = request.with_query(name, value);
        }

        let response = self.caps.http.execute(request).await?;
        if !response.is_success() {
            return Err(AppError::from_http_status(
                response.status(),
                Some(response.body()),
            ));
        }
        Ok(response.json::<Value>()?)
    }
}
