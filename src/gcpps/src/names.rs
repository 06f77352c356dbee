// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Fully qualified resource names.
//!
//! Applications may use short names (`my-topic`) or fully qualified names
//! (`projects/my-project/topics/my-topic`). The backend always receives fully
//! qualified names.

/// The fully qualified name of a project.
pub fn project_path(project: &str) -> String {
    format!("projects/{project}")
}

/// The fully qualified name of `topic` in `project`.
///
/// # Example
/// ```
/// use gcpps::names::topic_path;
/// assert_eq!(topic_path("p", "t"), "projects/p/topics/t");
/// assert_eq!(topic_path("p", "projects/q/topics/t"), "projects/q/topics/t");
/// ```
pub fn topic_path(project: &str, topic: &str) -> String {
    qualify(project, "topics", topic)
}

/// The fully qualified name of `subscription` in `project`.
pub fn subscription_path(project: &str, subscription: &str) -> String {
    qualify(project, "subscriptions", subscription)
}

fn qualify(project: &str, collection: &str, name: &str) -> String {
    if name.starts_with("projects/") {
        return name.to_string();
    }
    format!("projects/{project}/{collection}/{name}")
}
