use anyhow::Result;

use super::{print_request_detail, AppContext, Command};
use crate::requests::{NewRequest, ProjectDetails};

pub struct SubmitCommand {
    pub submission: NewRequest,
}

impl SubmitCommand {
    pub fn new(
        customer_name: String,
        customer_email: String,
        project_file_name: String,
        comments: Option<String>,
        details: ProjectDetails,
    ) -> Self {
        Self {
            submission: NewRequest {
                customer_name,
                customer_email,
                comments,
                project_file_name,
                details,
            },
        }
    }
}

impl Command for SubmitCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let actor = ctx.actor().await?;
        let request = ctx.engine.submit(self.submission.clone(), &actor).await?;

        println!("✅ Request submitted");
        print_request_detail(&request, Some(&actor));
        Ok(())
    }
}
