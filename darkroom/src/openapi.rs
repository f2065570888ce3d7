//! OpenAPI documentation for the image API.

use utoipa::OpenApi;

use crate::api;
use crate::errors;

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/api", description = "Image API server")
    ),
    paths(api::handlers::images::upload_image),
    components(
        schemas(
            api::models::images::ImageUploadResponse,
            errors::ErrorBody,
        )
    ),
    tags(
        (name = "images", description = "Develop form uploads into local storage.

The image payload is carried in the `image` form field. Its format is sniffed from the payload's magic bytes, never from the filename or declared content type. Each successful upload replaces the previously stored image; the on-disk encoding follows the configured storage path's extension.")
    ),
    info(
        title = "Darkroom API",
        version = "1.0.0",
        description = "Image ingestion service: accepts form-uploaded images, develops them, and stores the result at a fixed local path.

## Errors

Failures come back as JSON with a single `error` field carrying the failure's description:

```json
{
  \"error\": \"Failed to develop image: The image format could not be determined\"
}
```

Requests without image data are rejected with `400`; anything the decoder cannot develop, and any storage failure, is reported as `500`.",
    ),
)]
pub struct ApiDoc;
