//! IAM policy documents and the managed policy catalogue.

use super::{param_list, param_str, DriverError};
use crate::core::types::Params;
use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Managed policies known to the provider, in lookup order.
static MANAGED_POLICIES: &[&str] = &[
    "AWSDirectConnectReadOnlyAccess", "AmazonGlacierReadOnlyAccess", "AWSMarketplaceFullAccess",
    "AutoScalingConsoleReadOnlyAccess", "AmazonDMSRedshiftS3Role", "AWSQuickSightListIAM",
    "AWSHealthFullAccess", "AmazonRDSFullAccess", "SupportUser", "AmazonEC2FullAccess",
    "AWSElasticBeanstalkReadOnlyAccess", "AWSCertificateManagerReadOnly",
    "AWSQuicksightAthenaAccess", "AWSCodeCommitPowerUser", "AWSCodeCommitFullAccess",
    "IAMSelfManageServiceSpecificCredentials", "AmazonSQSFullAccess", "AWSLambdaFullAccess",
    "AWSIoTLogging", "AmazonEC2RoleforSSM", "AWSCloudHSMRole", "IAMFullAccess",
    "AmazonInspectorFullAccess", "AmazonElastiCacheFullAccess", "AWSAgentlessDiscoveryService",
    "AWSXrayWriteOnlyAccess", "AutoScalingReadOnlyAccess", "AutoScalingFullAccess",
    "AmazonEC2RoleforAWSCodeDeploy", "CloudWatchEventsBuiltInTargetExecutionAccess",
    "AmazonCloudDirectoryReadOnlyAccess", "AWSOpsWorksFullAccess",
    "AWSOpsWorksCMInstanceProfileRole", "AWSCodePipelineApproverAccess",
    "AWSApplicationDiscoveryAgentAccess", "ViewOnlyAccess", "AmazonElasticMapReduceRole",
    "AmazonRoute53DomainsReadOnlyAccess", "AWSOpsWorksRole",
    "ApplicationAutoScalingForAmazonAppStreamAccess", "AmazonEC2ContainerRegistryFullAccess",
    "SimpleWorkflowFullAccess", "AmazonS3FullAccess", "AWSStorageGatewayReadOnlyAccess",
    "Billing", "QuickSightAccessForS3StorageManagementAnalyticsReadOnly",
    "AmazonEC2ContainerRegistryReadOnly", "AmazonElasticMapReduceforEC2Role",
    "DatabaseAdministrator", "AmazonRedshiftReadOnlyAccess", "AmazonEC2ReadOnlyAccess",
    "AWSXrayReadOnlyAccess", "AWSElasticBeanstalkEnhancedHealth",
    "AmazonElasticMapReduceReadOnlyAccess", "AWSDirectoryServiceReadOnlyAccess",
    "AmazonVPCReadOnlyAccess", "CloudWatchEventsReadOnlyAccess",
    "AmazonAPIGatewayInvokeFullAccess", "AmazonKinesisAnalyticsReadOnly",
    "AmazonMobileAnalyticsFullAccess", "AmazonAPIGatewayPushToCloudWatchLogs",
    "AWSDataPipelineRole", "CloudWatchFullAccess", "ServiceCatalogAdminFullAccess",
    "AmazonRDSDirectoryServiceAccess", "AWSCodePipelineReadOnlyAccess", "ReadOnlyAccess",
    "AmazonMachineLearningBatchPredictionsAccess", "AmazonRekognitionReadOnlyAccess",
    "AWSCodeDeployReadOnlyAccess", "CloudSearchFullAccess", "AWSCloudHSMFullAccess",
    "AmazonEC2SpotFleetAutoscaleRole", "AWSCodeBuildDeveloperAccess", "AmazonEC2SpotFleetRole",
    "AmazonElasticTranscoderJobsSubmitter", "AWSCodeStarServiceRole",
    "AWSDirectoryServiceFullAccess", "AmazonDynamoDBFullAccess", "AmazonSESReadOnlyAccess",
    "AWSWAFReadOnlyAccess", "AutoScalingNotificationAccessRole", "AmazonMechanicalTurkReadOnly",
    "AmazonKinesisReadOnlyAccess", "AWSCodeDeployFullAccess", "CloudWatchActionsEC2Access",
    "AWSLambdaDynamoDBExecutionRole", "AmazonRoute53DomainsFullAccess",
    "AmazonElastiCacheReadOnlyAccess", "AmazonAthenaFullAccess",
    "AmazonElasticFileSystemReadOnlyAccess", "CloudFrontFullAccess",
    "AmazonMachineLearningRoleforRedshiftDataSource", "AWSCloudTrailFullAccess",
    "AmazonCognitoDeveloperAuthenticatedIdentities", "AWSConfigRole",
    "AmazonAppStreamServiceAccess", "AmazonRedshiftFullAccess", "AmazonZocaloReadOnlyAccess",
    "AWSCloudHSMReadOnlyAccess", "SystemAdministrator", "AmazonEC2ContainerServiceEventsRole",
    "AmazonRoute53ReadOnlyAccess", "AmazonEC2ReportsAccess",
    "AmazonEC2ContainerServiceAutoscaleRole", "AWSBatchServiceRole",
    "AWSElasticBeanstalkWebTier", "AmazonSQSReadOnlyAccess", "AmazonKinesisFullAccess",
    "AmazonMachineLearningReadOnlyAccess", "AmazonRekognitionFullAccess",
    "RDSCloudHsmAuthorizationRole", "AmazonMachineLearningFullAccess", "AdministratorAccess",
    "AmazonMachineLearningRealTimePredictionOnlyAccess", "AWSConfigUserAccess",
    "AWSIoTConfigAccess", "SecurityAudit", "AWSCodeStarFullAccess",
    "AmazonDynamoDBReadOnlyAccess", "AutoScalingConsoleFullAccess", "AmazonSNSReadOnlyAccess",
    "AmazonElasticMapReduceFullAccess", "AmazonS3ReadOnlyAccess",
    "AWSElasticBeanstalkFullAccess", "AmazonWorkSpacesAdmin", "AWSCodeDeployRole",
    "AmazonSESFullAccess", "CloudWatchLogsReadOnlyAccess",
    "AmazonKinesisFirehoseReadOnlyAccess", "AWSOpsWorksRegisterCLI",
    "AmazonDynamoDBFullAccesswithDataPipeline", "AmazonEC2RoleforDataPipelineRole",
    "CloudWatchLogsFullAccess", "AWSElasticBeanstalkMulticontainerDocker",
    "AmazonElasticTranscoderFullAccess", "IAMUserChangePassword",
    "AmazonAPIGatewayAdministrator", "ServiceCatalogEndUserAccess", "AmazonPollyReadOnlyAccess",
    "AmazonMobileAnalyticsWriteOnlyAccess", "AmazonEC2SpotFleetTaggingRole", "DataScientist",
    "AWSMarketplaceMeteringFullAccess", "AWSOpsWorksCMServiceRole", "AWSConnector",
    "AWSBatchFullAccess", "ServiceCatalogAdminReadOnlyAccess", "AmazonSSMFullAccess",
    "AWSCodeCommitReadOnly", "AmazonEC2ContainerServiceFullAccess", "AmazonCognitoReadOnly",
    "AmazonDMSCloudWatchLogsRole", "AWSApplicationDiscoveryServiceFullAccess",
    "AmazonVPCFullAccess", "AWSImportExportFullAccess", "AmazonMechanicalTurkFullAccess",
    "AmazonEC2ContainerRegistryPowerUser", "AmazonMachineLearningCreateOnlyAccess",
    "AWSCloudTrailReadOnlyAccess", "AWSLambdaExecute", "AWSIoTRuleActions",
    "AWSQuickSightDescribeRedshift", "VMImportExportRoleForAWSConnector",
    "AWSCodePipelineCustomActionAccess", "AWSOpsWorksInstanceRegistration",
    "AmazonCloudDirectoryFullAccess", "AWSStorageGatewayFullAccess", "AmazonLexReadOnly",
    "AmazonElasticTranscoderReadOnlyAccess", "AWSIoTConfigReadOnlyAccess",
    "AmazonWorkMailReadOnlyAccess", "AmazonDMSVPCManagementRole",
    "AWSLambdaKinesisExecutionRole", "ResourceGroupsandTagEditorReadOnlyAccess",
    "AmazonSSMAutomationRole", "ServiceCatalogEndUserFullAccess",
    "AWSStepFunctionsConsoleFullAccess", "AWSCodeBuildReadOnlyAccess",
    "AmazonMachineLearningManageRealTimeEndpointOnlyAccess", "CloudWatchEventsInvocationAccess",
    "CloudFrontReadOnlyAccess", "AmazonSNSRole", "AmazonMobileAnalyticsFinancialReportAccess",
    "AWSElasticBeanstalkService", "IAMReadOnlyAccess", "AmazonRDSReadOnlyAccess",
    "AmazonCognitoPowerUser", "AmazonElasticFileSystemFullAccess", "ServerMigrationConnector",
    "AmazonZocaloFullAccess", "AWSLambdaReadOnlyAccess", "AWSAccountUsageReportAccess",
    "AWSMarketplaceGetEntitlements", "AmazonEC2ContainerServiceforEC2Role",
    "AmazonAppStreamFullAccess", "AWSIoTDataAccess", "AmazonESFullAccess",
    "ServerMigrationServiceRole", "AWSWAFFullAccess", "AmazonKinesisFirehoseFullAccess",
    "CloudWatchReadOnlyAccess", "AWSLambdaBasicExecutionRole",
    "ResourceGroupsandTagEditorFullAccess", "AWSKeyManagementServicePowerUser",
    "AWSImportExportReadOnlyAccess", "AmazonElasticTranscoderRole",
    "AmazonEC2ContainerServiceRole", "AWSDeviceFarmFullAccess", "AmazonSSMReadOnlyAccess",
    "AWSStepFunctionsReadOnlyAccess", "AWSCodePipelineFullAccess",
    "AWSGreengrassResourceAccessRolePolicy", "NetworkAdministrator",
    "AmazonWorkSpacesApplicationManagerAdminAccess", "AmazonDRSVPCManagement",
    "AWSXrayFullAccess", "AWSElasticBeanstalkWorkerTier", "AWSDirectConnectFullAccess",
    "AWSCodeBuildAdminAccess", "AmazonKinesisAnalyticsFullAccess", "AWSAccountActivityAccess",
    "AmazonGlacierFullAccess", "AmazonWorkMailFullAccess", "AWSMarketplaceManageSubscriptions",
    "AWSElasticBeanstalkCustomPlatformforEC2Role", "AWSSupportAccess",
    "AmazonElasticMapReduceforAutoScalingRole", "IAMUserSSHKeys", "AWSIoTFullAccess",
    "AWSQuickSightDescribeRDS", "AWSConfigRulesExecutionRole", "AmazonESReadOnlyAccess",
    "AWSCodeDeployDeployerAccess", "AmazonPollyFullAccess", "AmazonSSMMaintenanceWindowRole",
    "AmazonRDSEnhancedMonitoringRole", "AmazonLexFullAccess", "AWSLambdaVPCAccessExecutionRole",
    "AmazonLexRunBotsOnly", "AmazonSNSFullAccess", "CloudSearchReadOnlyAccess",
    "AWSGreengrassFullAccess", "AWSCloudFormationReadOnlyAccess", "AmazonRoute53FullAccess",
    "AWSLambdaRole", "AWSLambdaENIManagementAccess", "AWSOpsWorksCloudWatchLogs",
    "AmazonAppStreamReadOnlyAccess", "AWSStepFunctionsFullAccess",
    "AmazonInspectorReadOnlyAccess", "AWSCertificateManagerFullAccess", "PowerUserAccess",
    "CloudWatchEventsFullAccess"
];

const POLICY_ARN_PREFIX: &str = "arn:aws:iam::aws:policy/";

/// ARN of the first managed policy whose lowercased name contains
/// `<service><access>`, with `access` one of `readonly` or `full`.
pub fn lookup_policy(service: &str, access: &str) -> Result<String, DriverError> {
    if access != "readonly" && access != "full" {
        return Err(DriverError::invalid(
            "access",
            "readonly or full",
            format!("access value can only be 'readonly' or 'full', got '{}'", access),
        ));
    }
    let wanted = format!("{}{}", service.to_lowercase(), access);
    MANAGED_POLICIES
        .iter()
        .find(|name| name.to_lowercase().contains(&wanted))
        .map(|name| format!("{}{}", POLICY_ARN_PREFIX, name))
        .ok_or_else(|| DriverError::PolicyLookup {
            service: service.to_string(),
            access: access.to_string(),
        })
}

/// ARNs of managed policies mentioning `service`, offered when a lookup fails.
pub fn policy_suggestions(service: &str) -> Vec<String> {
    let service = service.to_lowercase();
    MANAGED_POLICIES
        .iter()
        .filter(|name| name.to_lowercase().contains(&service))
        .map(|name| format!("{}{}", POLICY_ARN_PREFIX, name))
        .collect()
}

// ============================================================================
// Documents
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    #[serde(rename = "AWS", skip_serializing_if = "Option::is_none")]
    pub aws: Option<String>,
    #[serde(rename = "Service", skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    #[serde(rename = "Effect", skip_serializing_if = "String::is_empty")]
    pub effect: String,
    #[serde(rename = "Action", skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    #[serde(rename = "Resource", skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    #[serde(rename = "Principal", skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    #[serde(rename = "Condition", skip_serializing_if = "BTreeMap::is_empty")]
    pub conditions: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statements: Vec<Statement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<Statement>) -> Self {
        PolicyDocument {
            version: "2012-10-17".to_string(),
            statements,
        }
    }

    pub fn to_json(&self) -> Result<String, DriverError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DriverError::Other(format!("cannot marshal policy document: {}", e)))
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Build one statement. A lone `all` resource means `*`.
pub fn build_statement(
    effect: &str,
    actions: Vec<String>,
    resources: Vec<String>,
    conditions: &[String],
) -> Result<Statement, DriverError> {
    let mut resources = resources;
    if resources.len() == 1 && resources[0] == "all" {
        resources[0] = "*".to_string();
    }
    let mut stmt = Statement {
        effect: title_case(effect),
        actions,
        resources,
        ..Default::default()
    };
    for c in conditions {
        let (kind, key, value) = parse_condition(c)
            .map_err(|reason| DriverError::invalid("conditions", "condition", reason))?;
        stmt.conditions.entry(kind).or_default().insert(key, value);
    }
    Ok(stmt)
}

fn optional_list(params: &Params, key: &str) -> Result<Vec<String>, DriverError> {
    if params.contains_key(key) {
        param_list(params, key)
    } else {
        Ok(Vec::new())
    }
}

/// Statement from `effect`, `action`, `resource` and `conditions` params.
pub fn statement_from_params(params: &Params) -> Result<Statement, DriverError> {
    let effect = param_str(params, "effect")?;
    let actions = param_list(params, "action")?;
    let resources = param_list(params, "resource")?;
    build_statement(&effect, actions, resources, &optional_list(params, "conditions")?)
}

/// Assume-role trust policy. Principal precedence: account, user, service.
pub fn trust_document(params: &Params) -> Result<String, DriverError> {
    let principal = if let Some(v) = params.get("principal-account") {
        Principal {
            aws: Some(v.to_string()),
            service: None,
        }
    } else if let Some(v) = params.get("principal-user") {
        Principal {
            aws: Some(v.to_string()),
            service: None,
        }
    } else if let Some(v) = params.get("principal-service") {
        Principal {
            aws: None,
            service: Some(v.to_string()),
        }
    } else {
        Principal::default()
    };
    let mut stmt = build_statement(
        "Allow",
        vec!["sts:AssumeRole".to_string()],
        Vec::new(),
        &optional_list(params, "conditions")?,
    )?;
    stmt.principal = Some(principal);
    PolicyDocument::new(vec![stmt]).to_json()
}

/// Append `stmt` to an existing document, keeping its other fields.
pub fn merge_statement(document: &str, stmt: &Statement) -> Result<String, DriverError> {
    let bad = |e: serde_json::Error| DriverError::Other(format!("invalid policy document: {}", e));
    let mut doc: serde_json::Value = serde_json::from_str(document).map_err(bad)?;
    let new = serde_json::to_value(stmt).map_err(bad)?;
    let obj = doc
        .as_object_mut()
        .ok_or_else(|| DriverError::Other("invalid policy document: not an object".to_string()))?;
    let merged = match obj.remove("Statement") {
        Some(serde_json::Value::Array(mut items)) => {
            items.push(new);
            items
        }
        Some(single) => vec![single, new],
        None => vec![new],
    };
    obj.insert("Statement".to_string(), serde_json::Value::Array(merged));
    serde_json::to_string_pretty(&doc).map_err(bad)
}

/// Decode a URL-encoded document (`%XX` escapes, `+` as space).
pub fn query_unescape(s: &str) -> Result<String, DriverError> {
    urlencoding::decode(&s.replace('+', " "))
        .map(|decoded| decoded.into_owned())
        .map_err(|e| DriverError::Other(format!("decoding policy document: {}", e)))
}

// ============================================================================
// Conditions
// ============================================================================

fn condition_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([a-zA-Z0-9:_\-\[\]\*]+)(==|!=|=~|!~|<=|>=|<|>)(.*)$").ok())
        .as_ref()
}

fn strip_quotes(v: &str) -> &str {
    for q in ['\'', '"'] {
        if v.len() >= 2 && v.starts_with(q) && v.ends_with(q) {
            return &v[1..v.len() - 1];
        }
    }
    v
}

fn is_ip_or_cidr(v: &str) -> bool {
    let (ip, prefix) = match v.split_once('/') {
        Some((ip, prefix)) => (ip, Some(prefix)),
        None => (v, None),
    };
    let Ok(addr) = ip.parse::<std::net::IpAddr>() else {
        return false;
    };
    match prefix {
        None => true,
        Some(p) => {
            let max = if addr.is_ipv4() { 32 } else { 128 };
            p.parse::<u8>().map(|n| n <= max).unwrap_or(false)
        }
    }
}

fn operator_error(op: &str, what: &str, value: &str, allowed: &str) -> String {
    format!(
        "invalid operator '{}' for {} value '{}', expected {}",
        op, what, value, allowed
    )
}

/// Parse `key<op>value` into (condition type, key, value).
///
/// The value decides the family: `null`, ARNs, IP/CIDR, dates
/// (`2006-01-02T15:04:05Z`), integers, booleans, base64 blobs, then strings.
pub fn parse_condition(condition: &str) -> Result<(String, String, String), String> {
    let re = condition_pattern().ok_or("condition pattern unavailable")?;
    let caps = re
        .captures(condition)
        .ok_or_else(|| format!("invalid condition '{}'", condition))?;
    let key = caps[1].trim().to_string();
    let op = &caps[2];
    let value = strip_quotes(caps[3].trim()).to_string();
    let pick = |choices: &[(&str, &str)], what: &str, allowed: &str| -> Result<String, String> {
        choices
            .iter()
            .find(|(o, _)| *o == op)
            .map(|(_, t)| t.to_string())
            .ok_or_else(|| operator_error(op, what, &value, allowed))
    };

    let kind = if value.eq_ignore_ascii_case("null") {
        let v = match op {
            "==" => "true",
            "!=" => "false",
            _ => return Err(operator_error(op, "null", &value, "either '==' or '!='")),
        };
        return Ok(("Null".to_string(), key, v.to_string()));
    } else if value.starts_with("arn:") {
        pick(
            &[("==", "ArnEquals"), ("!=", "ArnNotEquals"), ("=~", "ArnLike"), ("!~", "ArnNotLike")],
            "arn",
            "either '==', '!=', '=~' or '!~'",
        )?
    } else if is_ip_or_cidr(&value) {
        pick(&[("==", "IpAddress"), ("!=", "NotIpAddress")], "IP", "either '==' or '!='")?
    } else if chrono::NaiveDateTime::parse_from_str(&value, "%Y-%m-%dT%H:%M:%SZ").is_ok() {
        pick(
            &[
                ("==", "DateEquals"),
                ("!=", "DateNotEquals"),
                ("<", "DateLessThan"),
                ("<=", "DateLessThanEquals"),
                (">", "DateGreaterThan"),
                (">=", "DateGreaterThanEquals"),
            ],
            "date",
            "either '==', '!=', '>', '>=', '<' or '<='",
        )?
    } else if value.parse::<i64>().is_ok() {
        pick(
            &[
                ("==", "NumericEquals"),
                ("!=", "NumericNotEquals"),
                ("<", "NumericLessThan"),
                ("<=", "NumericLessThanEquals"),
                (">", "NumericGreaterThan"),
                (">=", "NumericGreaterThanEquals"),
            ],
            "int",
            "either '==', '!=', '>', '>=', '<' or '<='",
        )?
    } else if let Some(b) = parse_bool(&value) {
        let v = match op {
            "==" => b,
            "!=" => !b,
            _ => return Err(operator_error(op, "bool", &value, "either '==' or '!='")),
        };
        return Ok(("Bool".to_string(), key, v.to_string()));
    } else if !value.is_empty()
        && base64::engine::general_purpose::STANDARD
            .decode(&value)
            .is_ok()
    {
        pick(&[("==", "BinaryEquals")], "binary", "'=='")?
    } else {
        pick(
            &[
                ("==", "StringEquals"),
                ("!=", "StringNotEquals"),
                ("=~", "StringLike"),
                ("!~", "StringNotLike"),
            ],
            "string",
            "either '==', '!=', '=~' or '!~'",
        )?
    };
    Ok((kind, key, value))
}

fn parse_bool(v: &str) -> Option<bool> {
    match v {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
