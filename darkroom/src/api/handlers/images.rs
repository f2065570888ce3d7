use axum::{Json, extract::State};
use tracing::info;

use crate::AppState;
use crate::api::extract::ImageUpload;
use crate::api::models::images::ImageUploadResponse;
use crate::develop::{DevelopedImage, develop};
use crate::errors::{Error, ErrorBody, Result};

#[utoipa::path(
    post,
    path = "/image",
    tag = "images",
    summary = "Upload image",
    description = "Develop a form-uploaded image and store it at the configured path, replacing whatever was stored before.",
    request_body(
        content_type = "multipart/form-data",
        description = "Form upload carrying the image payload in the `image` field. \
                       `application/x-www-form-urlencoded` bodies are accepted too."
    ),
    responses(
        (status = 200, description = "Image developed and stored", body = ImageUploadResponse),
        (status = 400, description = "No image data provided", body = ErrorBody),
        (status = 413, description = "Payload too large", body = ErrorBody),
        (status = 415, description = "Unsupported media type", body = ErrorBody),
        (status = 500, description = "Image could not be developed or stored", body = ErrorBody)
    )
)]
pub async fn upload_image(State(state): State<AppState>, upload: ImageUpload) -> Result<Json<ImageUploadResponse>> {
    let ImageUpload {
        data,
        filename,
        declared_content_type,
    } = upload;

    // Decode and encode on a blocking thread to avoid blocking async runtime
    let store = state.store.clone();
    let (developed, size_bytes) = tokio::task::spawn_blocking(move || -> Result<(DevelopedImage, u64)> {
        let developed = develop(&data)?;
        let size_bytes = store.write(&developed).map_err(Error::Store)?;
        Ok((developed, size_bytes))
    })
    .await
    .map_err(|e| Error::Internal {
        operation: format!("spawn image develop task: {e}"),
    })??;

    metrics::counter!("darkroom_images_developed_total", "format" => developed.format_name()).increment(1);

    info!(
        format = developed.format_name(),
        width = developed.width(),
        height = developed.height(),
        size_bytes,
        filename = ?filename,
        declared_content_type = ?declared_content_type,
        path = %state.store.path().display(),
        "Image developed and stored"
    );

    Ok(Json(ImageUploadResponse::from_developed(&developed, size_bytes)))
}

#[cfg(test)]
mod tests {
    use crate::api::models::images::ImageUploadResponse;
    use crate::errors::ErrorBody;
    use crate::test_utils::{create_test_app, jpeg_bytes, png_bytes, rgba_png_bytes};
    use axum::http::StatusCode;
    use std::fs;

    // Test: valid PNG upload is developed, stored, and acknowledged
    #[test_log::test(tokio::test)]
    async fn test_upload_png_success() {
        let (app, dir) = create_test_app();

        let part = axum_test::multipart::Part::bytes(png_bytes(32, 24)).file_name("photo.png");
        let response = app
            .post("/api/image")
            .multipart(axum_test::multipart::MultipartForm::new().add_part("image", part))
            .await;

        response.assert_status(StatusCode::OK);
        let body: ImageUploadResponse = response.json();
        assert_eq!(body.width, 32);
        assert_eq!(body.height, 24);
        assert_eq!(body.format, "png");
        assert!(body.size_bytes > 0);

        let stored = fs::metadata(dir.path().join("image.jpg")).expect("stored image should exist");
        assert_eq!(stored.len(), body.size_bytes);
    }

    // Test: JPEG uploads are detected as jpg regardless of filename
    #[test_log::test(tokio::test)]
    async fn test_upload_jpeg_success() {
        let (app, _dir) = create_test_app();

        let part = axum_test::multipart::Part::bytes(jpeg_bytes(16, 16)).file_name("whatever.bin");
        let response = app
            .post("/api/image")
            .multipart(axum_test::multipart::MultipartForm::new().add_part("image", part))
            .await;

        response.assert_status(StatusCode::OK);
        let body: ImageUploadResponse = response.json();
        assert_eq!(body.format, "jpg");
    }

    // Test: a multipart body without the image field is a client error
    #[test_log::test(tokio::test)]
    async fn test_upload_missing_image_field_rejected() {
        let (app, dir) = create_test_app();

        let response = app
            .post("/api/image")
            .multipart(axum_test::multipart::MultipartForm::new().add_text("name", "holiday snap"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: ErrorBody = response.json();
        assert_eq!(body.error, "No image data provided");
        assert!(!dir.path().join("image.jpg").exists());
    }

    // Test: payloads the decoder cannot identify surface as server errors
    #[test_log::test(tokio::test)]
    async fn test_upload_corrupt_payload_rejected() {
        let (app, dir) = create_test_app();

        let part = axum_test::multipart::Part::bytes(b"definitely not an image".to_vec()).file_name("photo.png");
        let response = app
            .post("/api/image")
            .multipart(axum_test::multipart::MultipartForm::new().add_part("image", part))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = response.json();
        assert!(!body.error.is_empty());
        assert!(!dir.path().join("image.jpg").exists());
    }

    // Test: an empty file part reaches the decoder and fails there
    #[test_log::test(tokio::test)]
    async fn test_upload_empty_file_rejected_by_decoder() {
        let (app, _dir) = create_test_app();

        let part = axum_test::multipart::Part::bytes(Vec::new()).file_name("empty.png");
        let response = app
            .post("/api/image")
            .multipart(axum_test::multipart::MultipartForm::new().add_part("image", part))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = response.json();
        assert!(!body.error.is_empty());
    }

    // Test: each successful upload replaces the stored image
    #[test_log::test(tokio::test)]
    async fn test_second_upload_overwrites_first() {
        let (app, dir) = create_test_app();

        let first = axum_test::multipart::Part::bytes(png_bytes(64, 64)).file_name("big.png");
        app.post("/api/image")
            .multipart(axum_test::multipart::MultipartForm::new().add_part("image", first))
            .await
            .assert_status(StatusCode::OK);

        let second = axum_test::multipart::Part::bytes(png_bytes(4, 4)).file_name("small.png");
        let response = app
            .post("/api/image")
            .multipart(axum_test::multipart::MultipartForm::new().add_part("image", second))
            .await;

        response.assert_status(StatusCode::OK);
        let body: ImageUploadResponse = response.json();
        assert_eq!(body.width, 4);

        let stored = fs::metadata(dir.path().join("image.jpg")).expect("stored image should exist");
        assert_eq!(stored.len(), body.size_bytes);
    }

    // Test: uploads over the configured limit are rejected before decoding
    #[test_log::test(tokio::test)]
    async fn test_upload_too_large_rejected() {
        let (app, dir) = create_test_app();

        let oversized = vec![0u8; 4 * 1024 * 1024 + 1];
        let part = axum_test::multipart::Part::bytes(oversized).file_name("huge.png");
        let response = app
            .post("/api/image")
            .multipart(axum_test::multipart::MultipartForm::new().add_part("image", part))
            .await;

        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        let body: ErrorBody = response.json();
        assert!(body.error.contains("maximum allowed size"));
        assert!(!dir.path().join("image.jpg").exists());
    }

    // Test: transparency survives the trip through the JPEG-targeted store
    #[test_log::test(tokio::test)]
    async fn test_upload_rgba_png_stored_without_alpha() {
        let (app, dir) = create_test_app();

        let part = axum_test::multipart::Part::bytes(rgba_png_bytes(8, 8)).file_name("transparent.png");
        let response = app
            .post("/api/image")
            .multipart(axum_test::multipart::MultipartForm::new().add_part("image", part))
            .await;

        response.assert_status(StatusCode::OK);
        let body: ImageUploadResponse = response.json();
        assert_eq!(body.format, "png");

        let stored = image::open(dir.path().join("image.jpg")).expect("stored image should decode");
        assert!(!stored.color().has_alpha());
    }

    // Test: when the image field repeats, the last occurrence wins
    #[test_log::test(tokio::test)]
    async fn test_repeated_image_fields_last_wins() {
        let (app, _dir) = create_test_app();

        let corrupt = axum_test::multipart::Part::bytes(b"garbage".to_vec()).file_name("a.png");
        let valid = axum_test::multipart::Part::bytes(png_bytes(8, 8)).file_name("b.png");
        let response = app
            .post("/api/image")
            .multipart(
                axum_test::multipart::MultipartForm::new()
                    .add_part("image", corrupt)
                    .add_part("image", valid),
            )
            .await;
        response.assert_status(StatusCode::OK);

        let valid = axum_test::multipart::Part::bytes(png_bytes(8, 8)).file_name("a.png");
        let corrupt = axum_test::multipart::Part::bytes(b"garbage".to_vec()).file_name("b.png");
        let response = app
            .post("/api/image")
            .multipart(
                axum_test::multipart::MultipartForm::new()
                    .add_part("image", valid)
                    .add_part("image", corrupt),
            )
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }

    // Test: bodies that are neither multipart nor urlencoded are refused
    #[test_log::test(tokio::test)]
    async fn test_unsupported_content_type_rejected() {
        let (app, _dir) = create_test_app();

        let response = app.post("/api/image").json(&serde_json::json!({ "image": "zzz" })).await;

        response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let body: ErrorBody = response.json();
        assert!(body.error.contains("Unsupported media type"));
        assert!(body.error.contains("application/json"));
    }

    // Test: only POST is routed
    #[test_log::test(tokio::test)]
    async fn test_get_method_not_allowed() {
        let (app, _dir) = create_test_app();

        let response = app.get("/api/image").await;

        response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
    }

    // Test: urlencoded form without the image field is a client error
    #[test_log::test(tokio::test)]
    async fn test_urlencoded_missing_image_field_rejected() {
        let (app, _dir) = create_test_app();

        let response = app.post("/api/image").form(&[("name", "holiday snap")]).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: ErrorBody = response.json();
        assert_eq!(body.error, "No image data provided");
    }

    // Test: an empty urlencoded value counts as no image at all
    #[test_log::test(tokio::test)]
    async fn test_urlencoded_empty_value_rejected() {
        let (app, _dir) = create_test_app();

        let response = app.post("/api/image").form(&[("image", "")]).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: ErrorBody = response.json();
        assert_eq!(body.error, "No image data provided");
    }

    // Test: urlencoded text never decodes as an image, so it fails in the decoder
    #[test_log::test(tokio::test)]
    async fn test_urlencoded_text_value_rejected_by_decoder() {
        let (app, dir) = create_test_app();

        let response = app.post("/api/image").form(&[("image", "not an image")]).await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = response.json();
        assert!(!body.error.is_empty());
        assert!(!dir.path().join("image.jpg").exists());
    }

    // Test: repeated urlencoded fields resolve to the last value
    #[test_log::test(tokio::test)]
    async fn test_urlencoded_repeated_fields_last_wins() {
        let (app, _dir) = create_test_app();

        let response = app.post("/api/image").form(&[("image", "garbage"), ("image", "")]).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: ErrorBody = response.json();
        assert_eq!(body.error, "No image data provided");
    }

    // Test: oversize urlencoded payloads are rejected with 413
    #[test_log::test(tokio::test)]
    async fn test_urlencoded_too_large_rejected() {
        let (app, dir) = create_test_app();

        // Just past the configured limit: the extractor's own check answers
        let response = app.post("/api/image").form(&[("image", "a".repeat(4 * 1024 * 1024 + 1))]).await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);

        // Far past it: the transport body cap rejects before the form is parsed
        let response = app.post("/api/image").form(&[("image", "a".repeat(5 * 1024 * 1024))]).await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        let body: ErrorBody = response.json();
        assert!(body.error.contains("maximum allowed size"));

        assert!(!dir.path().join("image.jpg").exists());
    }
}
