//! 分析指令模板
//!
//! 把职位名称和职位描述嵌入固定模板，交给分析服务

/// 期望分析服务返回的 JSON 结构
pub const RESPONSE_FORMAT: &str = r#"interface Feedback {
  overallScore: number; // max 100
  ATS: {
    score: number; // rate based on ATS suitability
    tips: {
      type: "good" | "improve";
      tip: string; // give 3-4 tips
    }[];
  };
  toneAndStyle: {
    score: number; // max 100
    tips: {
      type: "good" | "improve";
      tip: string; // make it a short "title" for the actual explanation
      explanation: string; // explain in detail here
    }[]; // give 3-4 tips
  };
  content: {
    score: number; // max 100
    tips: {
      type: "good" | "improve";
      tip: string;
      explanation: string;
    }[];
  };
  structure: {
    score: number; // max 100
    tips: {
      type: "good" | "improve";
      tip: string;
      explanation: string;
    }[];
  };
  skills: {
    score: number; // max 100
    tips: {
      type: "good" | "improve";
      tip: string;
      explanation: string;
    }[];
  };
}"#;

/// 组装分析指令
///
/// # 参数
/// - `job_title`: 职位名称
/// - `job_description`: 职位描述
///
/// # 返回
/// 完整的指令文本，要求服务只返回 JSON 对象
pub fn prepare_instructions(job_title: &str, job_description: &str) -> String {
    format!(
        "You are an expert in ATS (Applicant Tracking System) and resume analysis.\n\
         Please analyze and rate this resume and suggest how to improve it.\n\
         The rating can be low if the resume is bad.\n\
         Be thorough and detailed. Don't be afraid to point out any mistakes or areas for improvement.\n\
         If there is a lot to improve, don't hesitate to give low scores. This is to help the user to improve their resume.\n\
         If available, use the job description for the job user is applying to to give more detailed feedback.\n\
         If provided, take the job description into consideration.\n\
         The job title is: {job_title}\n\
         The job description is: {job_description}\n\
         Provide the feedback using the following format:\n\
         {RESPONSE_FORMAT}\n\
         Return the analysis as a JSON object, without any other text and without the backticks.\n\
         Do not include any other text or comments.",
        job_title = job_title.trim(),
        job_description = job_description.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embeds_job_context() {
        let text = prepare_instructions("  Engineer ", "Build things");
        assert!(text.contains("The job title is: Engineer\n"));
        assert!(text.contains("The job description is: Build things\n"));
        assert!(text.contains("interface Feedback"));
    }
}
