use anyhow::Error as AnyError;
use axum::{
    http::{HeaderValue, header::SET_COOKIE},
    response::Response,
};

use crate::AppError;

pub fn append_set_cookie_headers(
    response: &mut Response,
    cookies: &[String],
) -> Result<(), AppError> {
    for cookie in cookies {
        let value =
            HeaderValue::from_str(cookie).map_err(|err| AppError::internal(AnyError::new(err)))?;
        response.headers_mut().append(SET_COOKIE, value);
    }

    Ok(())
}
