use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::warn;

use super::error::multipart_error;
use crate::{
    import::auto_migrate,
    model::{Caller, Gender, Horse, HorseInput},
    repo::{horses, pregnancies, vaccines, visits},
    state::AppState,
    timeline::{build_timeline, TimelineEvent},
    uploads::{IncomingFile, UploadStore},
    AppError, AppResult,
};

const IMAGE_FIELD: &str = "image";
const CERT_FIELD: &str = "certImage";

struct Upload {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

impl Upload {
    fn as_incoming(&self) -> IncomingFile<'_> {
        IncomingFile {
            file_name: self.file_name.as_deref(),
            content_type: self.content_type.as_deref(),
            bytes: &self.bytes,
        }
    }
}

/// The horse form as posted by the client: text fields plus up to two images.
#[derive(Default)]
struct HorseForm {
    text: HashMap<String, String>,
    image: Option<Upload>,
    cert_image: Option<Upload>,
}

impl HorseForm {
    async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = HorseForm::default();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == IMAGE_FIELD || name == CERT_FIELD {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                // Browsers send an empty part for an untouched file input.
                if bytes.is_empty() {
                    continue;
                }
                let upload = Upload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                };
                if name == IMAGE_FIELD {
                    form.image = Some(upload);
                } else {
                    form.cert_image = Some(upload);
                }
            } else {
                let value = field.text().await.map_err(multipart_error)?;
                form.text.insert(name, value);
            }
        }
        Ok(form)
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.text
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> AppResult<&str> {
        self.field(name).ok_or_else(|| AppError::missing_field(name))
    }

    fn to_input(&self, image: Option<String>, cert_image: Option<String>) -> AppResult<HorseInput> {
        let age = self.required("age")?;
        let age = age
            .parse::<i64>()
            .map_err(|_| AppError::invalid_field("age", format!("'{age}' is not a whole number")))?;
        let gender = self.required("gender")?;
        let gender = gender
            .parse::<Gender>()
            .map_err(|err| AppError::invalid_field("gender", err.to_string()))?;
        Ok(HorseInput {
            name: self.required("name")?.to_string(),
            age,
            breed: self.required("breed")?.to_string(),
            gender,
            image,
            father_name: self.field("fatherName").map(str::to_string),
            mother_name: self.field("motherName").map(str::to_string),
            cert_image,
        })
    }

    /// Store the uploaded images. Files already written are removed again if
    /// a later one is rejected.
    async fn store_files(&self, uploads: &UploadStore) -> AppResult<StoredFiles> {
        let mut stored = StoredFiles::default();
        if let Some(upload) = &self.image {
            stored.image = Some(uploads.save_image(upload.as_incoming()).await?);
        }
        if let Some(upload) = &self.cert_image {
            match uploads.save_image(upload.as_incoming()).await {
                Ok(name) => stored.cert_image = Some(name),
                Err(err) => {
                    stored.discard(uploads).await;
                    return Err(err);
                }
            }
        }
        Ok(stored)
    }
}

#[derive(Default)]
struct StoredFiles {
    image: Option<String>,
    cert_image: Option<String>,
}

impl StoredFiles {
    async fn discard(&self, uploads: &UploadStore) {
        for name in [&self.image, &self.cert_image].into_iter().flatten() {
            uploads.remove(name).await;
        }
    }
}

pub async fn list(State(state): State<AppState>, caller: Caller) -> AppResult<Json<Vec<Horse>>> {
    if let Err(err) = auto_migrate(
        &state.pool,
        &state.uploads,
        state.remote.as_ref(),
        &caller.tenant_id,
        caller.is_admin,
    )
    .await
    {
        warn!(
            target: "stablebook",
            event = "auto_migration_failed",
            tenant = %caller.tenant_id,
            error = %err
        );
    }
    let horses = horses::list_scoped(&state.pool, caller.scope()).await?;
    Ok(Json(horses))
}

pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Horse>)> {
    let form = HorseForm::read(multipart).await?;
    // Reject a bad form before anything touches disk.
    form.to_input(None, None)?;
    let stored = form.store_files(&state.uploads).await?;
    let input = form.to_input(stored.image.clone(), stored.cert_image.clone())?;
    match state.sync.create_horse(&caller, &input).await {
        Ok(horse) => Ok((StatusCode::CREATED, Json(horse))),
        Err(err) => {
            stored.discard(&state.uploads).await;
            Err(err)
        }
    }
}

pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> AppResult<Json<Horse>> {
    let form = HorseForm::read(multipart).await?;
    let existing = horses::get_scoped(&state.pool, id, caller.scope())
        .await?
        .ok_or_else(|| AppError::not_found("horse", id))?;
    form.to_input(None, None)?;
    let stored = form.store_files(&state.uploads).await?;
    let input = form.to_input(
        stored.image.clone().or_else(|| existing.image.clone()),
        stored.cert_image.clone().or_else(|| existing.cert_image.clone()),
    )?;

    let horse = match state.sync.update_horse(&caller, id, &input).await {
        Ok(Some(horse)) => horse,
        Ok(None) => {
            stored.discard(&state.uploads).await;
            return Err(AppError::not_found("horse", id));
        }
        Err(err) => {
            stored.discard(&state.uploads).await;
            return Err(err);
        }
    };

    let replaced = [
        (stored.image.is_some(), &existing.image),
        (stored.cert_image.is_some(), &existing.cert_image),
    ];
    for (was_replaced, old) in replaced {
        if let (true, Some(old)) = (was_replaced, old) {
            state.uploads.remove(old).await;
        }
    }
    Ok(Json(horse))
}

pub async fn delete(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let deleted = state
        .sync
        .delete_horse(&caller, id)
        .await?
        .ok_or_else(|| AppError::not_found("horse", id))?;
    for name in deleted.stored_files() {
        state.uploads.remove(name).await;
    }

    let mut body = json!({
        "success": true,
        "firebaseId": deleted.horse.remote_id,
    });
    if caller.is_admin {
        body["relatedFirebaseIds"] = serde_json::to_value(deleted.related_remote_ids())?;
    }
    Ok(Json(body))
}

pub async fn timeline(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<TimelineEvent>>> {
    let horse = horses::get_scoped(&state.pool, id, caller.scope())
        .await?
        .ok_or_else(|| AppError::not_found("horse", id))?;
    let visits = visits::list_for_horse(&state.pool, horse.id).await?;
    let vaccines = vaccines::list_for_horse(&state.pool, horse.id).await?;
    let pregnancies = pregnancies::list_for_horse(&state.pool, horse.id).await?;
    Ok(Json(build_timeline(&visits, &vaccines, &pregnancies)))
}
