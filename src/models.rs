use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub about: Option<String>,
    pub logo: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Any,
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Any => "any",
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "any" => Ok(Gender::Any),
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(anyhow!("Invalid gender: {} (expected any, male, female)", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub title: String,
    pub company_id: i64,
    pub company_name: String, // joined from companies
    pub job_type: Option<String>,
    pub status: String,
    pub duties_and_responsibilities: Option<String>,
    pub job_requirements: Option<String>,
    pub province_ids: Vec<i64>,
    pub contract_type: Option<String>,
    pub contract_duration: Option<String>,
    pub contract_extensible: bool,
    pub probation_period: Option<String>,
    pub vacancy_count: i64,
    pub salary_range: Option<String>,
    pub experience: Option<String>, // free text, e.g. "3-5 years"
    pub gender: Gender,
    pub closing_date: Option<String>,
    pub posting_date: Option<String>,
    pub reference_number: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields accepted when creating a job; the company is referenced by name.
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub title: String,
    pub company: String,
    pub job_type: Option<String>,
    pub status: Option<String>,
    pub duties_and_responsibilities: Option<String>,
    pub job_requirements: Option<String>,
    pub province_ids: Vec<i64>,
    pub contract_type: Option<String>,
    pub contract_duration: Option<String>,
    pub contract_extensible: bool,
    pub probation_period: Option<String>,
    pub vacancy_count: Option<i64>,
    pub salary_range: Option<String>,
    pub experience: Option<String>,
    pub gender: Gender,
    pub closing_date: Option<String>,
    pub posting_date: Option<String>,
    pub reference_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: Option<String>,
    pub format: Option<String>,
    pub language: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}
