// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Runs the body of a background job. A panic becomes an error message so
/// the job still reports back to the render thread.
pub(crate) fn run_contained<T>(job: &'static str, body: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(body)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        log::error!("{} job panicked: {}", job, message);
        message
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_the_body_result() {
        assert_eq!(run_contained("test", || 7), Ok(7));
    }

    #[test]
    fn panic_becomes_its_message() {
        let index = 4;
        let result: Result<(), String> =
            run_contained("test", || panic!("index {index} out of range"));
        assert_eq!(result, Err("index 4 out of range".to_string()));
        assert_eq!(
            run_contained("test", || -> u8 { panic!("static") }),
            Err("static".to_string())
        );
    }
}
